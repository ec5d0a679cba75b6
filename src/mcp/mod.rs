//! MCP (Model Context Protocol) Server Implementation
//!
//! A JSON-RPC 2.0 server over stdio exposing cocktail search, recommendation
//! and filtering tools to AI assistants.


pub mod protocol;
pub mod server;
pub mod tools;

pub use server::{ConnectionState, McpServer, ToolHandler};
