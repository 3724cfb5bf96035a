//! # Travel Agent
//!
//! Answers natural-language travel queries by fanning out to independent
//! MCP tool servers and aggregating whatever they return.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`agent`]: Query parsing, MCP clients and the orchestrator
//! - [`services`]: Tool server implementations (geocoding, POI, Wikipedia, trivia)
//! - [`mcp`]: MCP server exposing one service as one tool
//! - [`api`]: HTTP surface over the orchestrator
//! - [`models`]: Request, response and aggregate types
//! - [`utils`]: HTTP client, rate limiting and geodesy
//! - [`config`]: Configuration management

pub mod agent;
pub mod api;
pub mod config;
pub mod mcp;
pub mod models;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use agent::{Orchestrator, ToolCaller};
pub use models::{AgentResponse, ToolResult};
pub use services::{ServiceKind, ServiceRegistry, ToolService};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
