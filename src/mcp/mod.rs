//! MCP (Model Context Protocol) tool servers.

pub mod server;
mod tools;

pub use server::McpServer;
pub use tools::{ServiceToolHandler, Tool, ToolHandler, ToolRegistry};
