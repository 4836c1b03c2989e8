use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::abi::{decode_revert_reason, parse_hex_bytes};
use crate::errors::VaultError;

#[derive(Debug, Serialize)]
pub struct JsonRpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: &'a Value,
}

impl<'a> JsonRpcRequest<'a> {
    pub fn new(id: u64, method: &'a str, params: &'a Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

/// `error` member of a JSON-RPC response.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcErrorObject {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

impl JsonRpcErrorObject {
    /// Revert payload as hex, if the node attached one. Some nodes nest it
    /// one level deeper as `{"data": "0x..."}`.
    pub fn revert_data(&self) -> Option<&str> {
        match self.data.as_ref()? {
            Value::String(s) => Some(s.as_str()),
            Value::Object(map) => map.get("data").and_then(Value::as_str),
            _ => None,
        }
    }

    pub fn into_vault_error(self) -> VaultError {
        let decoded = self
            .revert_data()
            .and_then(|hex| parse_hex_bytes(hex).ok())
            .filter(|bytes| !bytes.is_empty())
            .map(|bytes| decode_revert_reason(&bytes));
        let data = self.revert_data().map(str::to_string);
        VaultError::ContractReverted {
            code: self.code,
            reason: decoded.unwrap_or(self.message),
            data,
        }
    }
}

/// A response body, sorted into its JSON-RPC meaning.
#[derive(Debug)]
pub enum Envelope {
    /// `result` was present; may be `null`.
    Result(Value),
    Error(JsonRpcErrorObject),
}

/// Classify a response body. `Err` carries why the envelope is malformed,
/// which the transport treats like any other endpoint failure.
pub fn classify(body: Value) -> Result<Envelope, String> {
    let Value::Object(mut map) = body else {
        return Err("response is not a JSON object".into());
    };

    if let Some(error) = map.remove("error") {
        if !error.is_null() {
            return serde_json::from_value::<JsonRpcErrorObject>(error)
                .map(Envelope::Error)
                .map_err(|e| format!("unparseable error object: {e}"));
        }
    }

    map.remove("result")
        .map(Envelope::Result)
        .ok_or_else(|| "response has neither result nor error".into())
}
