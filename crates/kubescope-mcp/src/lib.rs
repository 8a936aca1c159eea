//! Kubescope MCP - Model Context Protocol server
//!
//! Exposes the context registry and the topology graph as MCP tools.

pub mod handlers;
pub mod kubectl;
pub mod server;
pub mod tools;
pub mod transport;

#[cfg(feature = "sse")]
pub mod sse;

pub use handlers::{ToolCallResponse, ToolHandler};
pub use kubectl::{KubectlClient, KubectlError};
pub use server::McpServer;

#[cfg(feature = "sse")]
pub use sse::run_sse_server;
