//! Line-delimited JSON-RPC server for the cocktail tools
//!
//! Every input line is one message. Requests get exactly one reply line;
//! notifications and blank lines get none. Tools are kept in name order, which
//! is also the order `tools/list` reports them in.

use crate::mcp::protocol::*;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use tokio::io::{self, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const INSTRUCTIONS: &str = "Cocktail recipe search: semantic search, recommendations by name or \
     ingredients, and exact ingredient filters";

/// Lifecycle of the single client connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Uninitialized,
    Initializing,
    Ready,
    Closed,
}

/// A tool the server can run
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Name, description and input schema shown by `tools/list`
    fn definition(&self) -> Tool;

    /// Run the tool
    ///
    /// `Err` means the arguments were unusable and becomes an "Invalid params"
    /// reply. A failing operation is reported inside the result instead.
    async fn call(&self, arguments: &Arguments) -> Result<CallToolResult>;
}

pub struct McpServer {
    info: Implementation,
    tools: RwLock<BTreeMap<String, Box<dyn ToolHandler>>>,
    state: RwLock<ConnectionState>,
}

impl McpServer {
    #[inline]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            info: Implementation {
                name: name.into(),
                version: version.into(),
            },
            tools: RwLock::new(BTreeMap::new()),
            state: RwLock::new(ConnectionState::Uninitialized),
        }
    }

    /// Add a tool, replacing any earlier tool with the same name
    #[inline]
    pub async fn register<H>(&self, handler: H)
    where
        H: ToolHandler + 'static,
    {
        let name = handler.definition().name;
        debug!("Registered tool: {}", name);
        self.tools.write().await.insert(name, Box::new(handler));
    }

    #[inline]
    pub async fn tool_names(&self) -> Vec<String> {
        self.tools.read().await.keys().cloned().collect()
    }

    #[inline]
    pub async fn connection_state(&self) -> ConnectionState {
        *self.state.read().await
    }

    #[inline]
    pub async fn serve_stdio(&self) -> Result<()> {
        info!("Starting MCP server with stdio transport");
        self.serve(io::stdin(), io::stdout()).await
    }

    /// Answer messages from `input` on `output` until `input` reaches EOF
    #[inline]
    pub async fn serve<R, W>(&self, input: R, mut output: W) -> Result<()>
    where
        R: AsyncRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send,
    {
        let mut lines = BufReader::new(input).lines();
        while let Some(line) = lines
            .next_line()
            .await
            .context("Failed to read from client")?
        {
            if let Some(reply) = self.handle_line(&line).await {
                let mut encoded = serde_json::to_vec(&reply).context("Failed to encode reply")?;
                encoded.push(b'\n');
                output
                    .write_all(&encoded)
                    .await
                    .context("Failed to write reply")?;
                output.flush().await.context("Failed to flush reply")?;
            }
        }

        *self.state.write().await = ConnectionState::Closed;
        info!("Client closed the connection");
        Ok(())
    }

    /// Process one input line, returning the reply to send, if any
    #[inline]
    pub async fn handle_line(&self, line: &str) -> Option<Reply> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                warn!("Discarding malformed JSON: {}", e);
                return Some(Reply::failure(None, RpcError::parse_error(e)));
            }
        };

        match parse_message(&value) {
            Ok(Incoming::Request { id, method, params }) => {
                Some(match self.dispatch(&method, params).await {
                    Ok(result) => Reply::success(id, result),
                    Err(error) => {
                        debug!("{:?} failed: {}", method, error);
                        Reply::failure(Some(id), error)
                    }
                })
            }
            Ok(Incoming::Notification { method }) => {
                self.notify(&method).await;
                None
            }
            Err(error) => {
                warn!("Invalid message: {}", error);
                Some(Reply::failure(request_id(&value), error))
            }
        }
    }

    async fn dispatch(
        &self,
        method: &Method,
        params: Option<Value>,
    ) -> std::result::Result<Value, RpcError> {
        match method {
            Method::Initialize => self.initialize(params).await,
            Method::ListTools => Ok(self.list_tools().await),
            Method::CallTool => self.call_tool(params).await,
            Method::Ping => Ok(json!({})),
            Method::Unknown(name) => Err(RpcError::method_not_found(name)),
        }
    }

    async fn notify(&self, method: &str) {
        match method {
            "notifications/initialized" | "initialized" => {
                *self.state.write().await = ConnectionState::Ready;
                info!("Client ready");
            }
            "notifications/cancelled" => debug!("Client cancelled a request"),
            other => debug!("Ignoring notification {}", other),
        }
    }

    async fn initialize(&self, params: Option<Value>) -> std::result::Result<Value, RpcError> {
        let params: InitializeParams = decode_params(params)?;
        if !is_protocol_version_supported(&params.protocol_version) {
            return Err(RpcError::invalid_params(format!(
                "unsupported protocol version {}; supported: {}",
                params.protocol_version,
                SUPPORTED_PROTOCOL_VERSIONS.join(", ")
            )));
        }

        *self.state.write().await = ConnectionState::Initializing;
        info!(
            "Client {} connected with protocol {}",
            params
                .client_info
                .as_ref()
                .map_or("unknown", |client| client.name.as_str()),
            params.protocol_version
        );

        Ok(json!({
            "protocolVersion": params.protocol_version,
            "capabilities": {
                "logging": {},
                "tools": {"listChanged": false}
            },
            "serverInfo": self.info,
            "instructions": INSTRUCTIONS,
        }))
    }

    async fn list_tools(&self) -> Value {
        let tools: Vec<Tool> = self
            .tools
            .read()
            .await
            .values()
            .map(|handler| handler.definition())
            .collect();
        json!({ "tools": tools })
    }

    async fn call_tool(&self, params: Option<Value>) -> std::result::Result<Value, RpcError> {
        let params: CallToolParams = decode_params(params)?;

        let tools = self.tools.read().await;
        let handler = tools
            .get(&params.name)
            .ok_or_else(|| RpcError::invalid_params(format!("unknown tool '{}'", params.name)))?;

        debug!("Calling tool {}", params.name);
        let result = handler
            .call(&params.arguments)
            .await
            .map_err(|e| RpcError::invalid_params(format!("{:#}", e)))?;
        serde_json::to_value(result).map_err(RpcError::internal)
    }
}

fn decode_params<T: DeserializeOwned>(params: Option<Value>) -> std::result::Result<T, RpcError> {
    let params = params.ok_or_else(|| RpcError::invalid_params("missing params"))?;
    serde_json::from_value(params).map_err(RpcError::invalid_params)
}
