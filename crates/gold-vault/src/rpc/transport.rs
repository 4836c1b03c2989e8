//! JSON-RPC transport with primary/secondary fallback.
//!
//! A transport-level failure (timeout, non-2xx status, connection error,
//! malformed envelope) on the primary moves to the secondary exactly once.
//! A well-formed JSON-RPC error is an answer, not a failure, and is returned
//! as `ContractReverted` without touching the secondary.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use super::envelope::{classify, Envelope, JsonRpcRequest};
use super::RpcClient;
use crate::errors::VaultError;

/// Why a single endpoint attempt produced no usable envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointFailure {
    Timeout,
    Status(u16),
    Connection(String),
    Malformed(String),
}

impl fmt::Display for EndpointFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => f.write_str("timed out"),
            Self::Status(code) => write!(f, "HTTP {code}"),
            Self::Connection(e) => write!(f, "connection error: {e}"),
            Self::Malformed(e) => write!(f, "malformed response: {e}"),
        }
    }
}

/// One JSON-RPC endpoint: posts a request body, returns the response body.
#[async_trait]
pub trait JsonRpcEndpoint: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, body: &Value) -> Result<Value, EndpointFailure>;
}

/// HTTPS endpoint backed by `reqwest`.
pub struct HttpEndpoint {
    name: String,
    url: String,
    client: reqwest::Client,
}

impl HttpEndpoint {
    pub fn new(name: impl Into<String>, url: impl Into<String>, timeout: Duration) -> Result<Self, VaultError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VaultError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            name: name.into(),
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl JsonRpcEndpoint for HttpEndpoint {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, body: &Value) -> Result<Value, EndpointFailure> {
        let resp = self
            .client
            .post(&self.url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EndpointFailure::Timeout
                } else {
                    EndpointFailure::Connection(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(EndpointFailure::Status(status.as_u16()));
        }

        resp.json::<Value>()
            .await
            .map_err(|e| EndpointFailure::Malformed(e.to_string()))
    }
}

/// Primary endpoint with an optional secondary.
pub struct FallbackTransport {
    primary: Box<dyn JsonRpcEndpoint>,
    secondary: Option<Box<dyn JsonRpcEndpoint>>,
    timeout: Duration,
    next_id: AtomicU64,
}

impl FallbackTransport {
    pub fn new(
        primary: Box<dyn JsonRpcEndpoint>,
        secondary: Option<Box<dyn JsonRpcEndpoint>>,
        timeout: Duration,
    ) -> Self {
        Self {
            primary,
            secondary,
            timeout,
            next_id: AtomicU64::new(1),
        }
    }

    /// Build from URLs; an empty fallback URL means no secondary.
    pub fn from_urls(primary_url: &str, fallback_url: &str, timeout: Duration) -> Result<Self, VaultError> {
        let primary: Box<dyn JsonRpcEndpoint> =
            Box::new(HttpEndpoint::new("primary", primary_url, timeout)?);
        let secondary: Option<Box<dyn JsonRpcEndpoint>> = if fallback_url.is_empty() {
            None
        } else {
            Some(Box::new(HttpEndpoint::new("fallback", fallback_url, timeout)?))
        };
        Ok(Self::new(primary, secondary, timeout))
    }

    async fn attempt(
        &self,
        endpoint: &dyn JsonRpcEndpoint,
        body: &Value,
    ) -> Result<Envelope, EndpointFailure> {
        let raw = tokio::time::timeout(self.timeout, endpoint.send(body))
            .await
            .map_err(|_| EndpointFailure::Timeout)??;
        classify(raw).map_err(EndpointFailure::Malformed)
    }
}

#[async_trait]
impl RpcClient for FallbackTransport {
    async fn request(&self, method: &str, params: Value) -> Result<Value, VaultError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = serde_json::to_value(JsonRpcRequest::new(id, method, &params))?;

        let endpoints = std::iter::once(self.primary.as_ref()).chain(self.secondary.as_deref());
        let mut attempts = Vec::new();

        for endpoint in endpoints {
            match self.attempt(endpoint, &body).await {
                Ok(Envelope::Result(result)) => {
                    debug!(method, endpoint = endpoint.name(), "rpc ok");
                    return Ok(result);
                }
                Ok(Envelope::Error(err)) => {
                    debug!(method, endpoint = endpoint.name(), code = err.code, "rpc error response");
                    return Err(err.into_vault_error());
                }
                Err(failure) => {
                    warn!(
                        method,
                        endpoint = endpoint.name(),
                        error = %failure,
                        "rpc endpoint failed"
                    );
                    attempts.push(format!("{}: {failure}", endpoint.name()));
                }
            }
        }

        Err(VaultError::RpcUnavailable {
            method: method.to_string(),
            attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    enum Script {
        Answer(Value),
        Fail(EndpointFailure),
        Hang,
    }

    struct ScriptedEndpoint {
        name: &'static str,
        script: Script,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedEndpoint {
        fn boxed(name: &'static str, script: Script) -> (Box<dyn JsonRpcEndpoint>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let ep = Self {
                name,
                script,
                calls: calls.clone(),
            };
            (Box::new(ep), calls)
        }
    }

    #[async_trait]
    impl JsonRpcEndpoint for ScriptedEndpoint {
        fn name(&self) -> &str {
            self.name
        }

        async fn send(&self, body: &Value) -> Result<Value, EndpointFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.script {
                Script::Answer(result) => Ok(json!({
                    "jsonrpc": "2.0",
                    "id": body["id"],
                    "result": result,
                })),
                Script::Fail(f) => Err(f.clone()),
                Script::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Err(EndpointFailure::Connection("unreachable".into()))
                }
            }
        }
    }

    struct RevertingEndpoint;

    #[async_trait]
    impl JsonRpcEndpoint for RevertingEndpoint {
        fn name(&self) -> &str {
            "primary"
        }

        async fn send(&self, body: &Value) -> Result<Value, EndpointFailure> {
            Ok(json!({
                "jsonrpc": "2.0",
                "id": body["id"],
                "error": {"code": 3, "message": "execution reverted"},
            }))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_primary_timeout_falls_back_to_secondary() {
        let (primary, primary_calls) = ScriptedEndpoint::boxed("primary", Script::Hang);
        let (secondary, secondary_calls) =
            ScriptedEndpoint::boxed("fallback", Script::Answer(json!("0x1")));
        let transport = FallbackTransport::new(primary, Some(secondary), Duration::from_secs(10));

        let result = transport.request("eth_chainId", json!([])).await.unwrap();

        assert_eq!(result, json!("0x1"));
        assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
        assert_eq!(secondary_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_revert_is_not_retried() {
        let (secondary, secondary_calls) =
            ScriptedEndpoint::boxed("fallback", Script::Answer(json!("0x")));
        let transport = FallbackTransport::new(
            Box::new(RevertingEndpoint),
            Some(secondary),
            Duration::from_secs(10),
        );

        let err = transport.request("eth_call", json!([])).await.unwrap_err();

        assert!(matches!(err, VaultError::ContractReverted { code: 3, .. }));
        assert_eq!(secondary_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_both_failing_is_rpc_unavailable() {
        let (primary, _) = ScriptedEndpoint::boxed("primary", Script::Fail(EndpointFailure::Status(503)));
        let (secondary, _) = ScriptedEndpoint::boxed(
            "fallback",
            Script::Fail(EndpointFailure::Connection("refused".into())),
        );
        let transport = FallbackTransport::new(primary, Some(secondary), Duration::from_secs(10));

        match transport.request("eth_call", json!([])).await.unwrap_err() {
            VaultError::RpcUnavailable { method, attempts } => {
                assert_eq!(method, "eth_call");
                assert_eq!(attempts.len(), 2);
                assert!(attempts[0].contains("HTTP 503"));
                assert!(attempts[1].contains("refused"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_envelope_falls_back() {
        let (primary, _) = ScriptedEndpoint::boxed(
            "primary",
            Script::Fail(EndpointFailure::Malformed("expected value".into())),
        );
        let (secondary, _) = ScriptedEndpoint::boxed("fallback", Script::Answer(json!(null)));
        let transport = FallbackTransport::new(primary, Some(secondary), Duration::from_secs(10));

        let result = transport
            .request("eth_getTransactionReceipt", json!(["0xabc"]))
            .await
            .unwrap();
        assert!(result.is_null());
    }

    #[tokio::test]
    async fn test_no_secondary_surfaces_single_attempt() {
        let (primary, _) = ScriptedEndpoint::boxed("primary", Script::Fail(EndpointFailure::Timeout));
        let transport = FallbackTransport::new(primary, None, Duration::from_secs(10));

        match transport.request("eth_chainId", json!([])).await.unwrap_err() {
            VaultError::RpcUnavailable { attempts, .. } => {
                assert_eq!(attempts, vec!["primary: timed out".to_string()]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
