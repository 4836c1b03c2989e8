pub mod envelope;
pub mod eth;
pub mod transport;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::VaultError;

pub use transport::{EndpointFailure, FallbackTransport, HttpEndpoint, JsonRpcEndpoint};

/// Anything that answers JSON-RPC requests. The engine only sees this seam;
/// `FallbackTransport` is the production implementation.
#[async_trait]
pub trait RpcClient: Send + Sync {
    /// Returns the `result` member. A JSON-RPC error response surfaces as
    /// `VaultError::ContractReverted`.
    async fn request(&self, method: &str, params: Value) -> Result<Value, VaultError>;
}
