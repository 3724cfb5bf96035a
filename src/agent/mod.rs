//! The travel agent: query parsing, MCP clients and the orchestrator.

mod client;
mod orchestrator;
pub mod protocol;
pub mod query_parser;

pub use client::{ClientError, McpClient, ToolCaller};
pub use orchestrator::{AgentError, Orchestrator};
pub use query_parser::{FallbackQueryParser, LlmQueryParser, QueryParser};
