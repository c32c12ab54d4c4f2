//! MCP (Model Context Protocol) server for bbmcp.
//!
//! This crate exposes Bitbucket Server pull-request operations as MCP tools
//! over newline-delimited JSON-RPC on stdin/stdout.

pub mod handlers;
pub mod protocol;
pub mod schema;
pub mod server;
pub mod tools;
pub mod transport;

#[cfg(test)]
mod testing;

pub use handlers::ToolHandler;
pub use server::McpServer;
pub use transport::StdioTransport;
