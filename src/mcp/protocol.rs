//! JSON-RPC 2.0 framing and the part of MCP the cocktail server speaks
//!
//! Only what the server routes is modelled: requests and notifications come
//! in, results and errors go out. A client has no reason to send responses,
//! so those are classified as invalid requests.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::Display;

/// Newest MCP revision the server implements
pub const MCP_VERSION: &str = "2025-06-18";

/// Protocol versions a client may request
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &[MCP_VERSION, "2025-03-26", "2024-11-05"];

const JSONRPC_VERSION: &str = "2.0";

/// Tool arguments as sent by the client
pub type Arguments = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    Text(String),
}

/// Request methods the server knows how to answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    Initialize,
    ListTools,
    CallTool,
    Ping,
    Unknown(String),
}

impl Method {
    #[inline]
    pub fn from_name(name: &str) -> Self {
        match name {
            "initialize" => Self::Initialize,
            "tools/list" => Self::ListTools,
            "tools/call" => Self::CallTool,
            "ping" => Self::Ping,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// A classified incoming message
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    Request {
        id: RequestId,
        method: Method,
        params: Option<Value>,
    },
    Notification {
        method: String,
    },
}

/// Classify a decoded line; the error is the "Invalid Request" to send back
#[inline]
pub fn parse_message(value: &Value) -> Result<Incoming, RpcError> {
    let object = value
        .as_object()
        .ok_or_else(|| RpcError::invalid_request("message must be a JSON object"))?;

    if object.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
        return Err(RpcError::invalid_request("jsonrpc must be \"2.0\""));
    }

    let method = match object.get("method") {
        Some(Value::String(method)) if !method.is_empty() => method,
        Some(_) => return Err(RpcError::invalid_request("method must be a non-empty string")),
        None => return Err(RpcError::invalid_request("responses from the client are not expected")),
    };

    match object.get("id") {
        None => Ok(Incoming::Notification {
            method: method.clone(),
        }),
        Some(id) => {
            let id = serde_json::from_value(id.clone()).map_err(|_| {
                RpcError::invalid_request("id must be a string or an integer")
            })?;
            Ok(Incoming::Request {
                id,
                method: Method::from_name(method),
                params: object.get("params").cloned(),
            })
        }
    }
}

/// Best-effort id of a message that failed classification
#[inline]
pub fn request_id(value: &Value) -> Option<RequestId> {
    value
        .get("id")
        .and_then(|id| serde_json::from_value(id.clone()).ok())
}

#[inline]
pub fn is_protocol_version_supported(version: &str) -> bool {
    SUPPORTED_PROTOCOL_VERSIONS.contains(&version)
}

/// JSON-RPC error object
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[error("{message} ({code})")]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;

    fn with_detail(code: i32, message: &str, detail: impl Display) -> Self {
        Self {
            code,
            message: message.to_string(),
            data: Some(Value::String(detail.to_string())),
        }
    }

    #[inline]
    pub fn parse_error(detail: impl Display) -> Self {
        Self::with_detail(Self::PARSE_ERROR, "Parse error", detail)
    }

    #[inline]
    pub fn invalid_request(detail: impl Display) -> Self {
        Self::with_detail(Self::INVALID_REQUEST, "Invalid Request", detail)
    }

    #[inline]
    pub fn method_not_found(method: &str) -> Self {
        Self::with_detail(Self::METHOD_NOT_FOUND, "Method not found", method)
    }

    #[inline]
    pub fn invalid_params(detail: impl Display) -> Self {
        Self::with_detail(Self::INVALID_PARAMS, "Invalid params", detail)
    }

    #[inline]
    pub fn internal(detail: impl Display) -> Self {
        Self::with_detail(Self::INTERNAL_ERROR, "Internal error", detail)
    }
}

/// One outgoing line: a result or an error for a request id
#[derive(Debug, Clone, Serialize)]
pub struct Reply {
    jsonrpc: &'static str,
    pub id: Option<RequestId>,
    #[serde(flatten)]
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Result(Value),
    Error(RpcError),
}

impl Reply {
    #[inline]
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id: Some(id),
            outcome: Outcome::Result(result),
        }
    }

    /// Error reply; `id` is `None` when the request could not be identified
    #[inline]
    pub fn failure(id: Option<RequestId>, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            outcome: Outcome::Error(error),
        }
    }
}

/// Name and version exchanged during `initialize`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Implementation {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    pub protocol_version: String,
    pub client_info: Option<Implementation>,
}

/// A tool as advertised by `tools/list`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallToolParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Arguments,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    pub content: Vec<ToolContent>,
    pub is_error: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    Text { text: String },
}

impl CallToolResult {
    /// Successful result carrying `value` as pretty-printed JSON text
    #[inline]
    pub fn json(value: &Value) -> serde_json::Result<Self> {
        Ok(Self {
            content: vec![ToolContent::Text {
                text: serde_json::to_string_pretty(value)?,
            }],
            is_error: false,
        })
    }

    /// The tool ran but its operation failed; the client sees `text`
    #[inline]
    pub fn failure(text: String) -> Self {
        Self {
            content: vec![ToolContent::Text { text }],
            is_error: true,
        }
    }

    #[inline]
    pub fn text(&self) -> &str {
        match self.content.first() {
            Some(ToolContent::Text { text }) => text,
            None => "",
        }
    }
}
