//! Core data models for agent queries and tool server payloads.

mod agent;
mod tools;

pub use agent::{AgentQuery, AgentResponse, Category, ParsedQuery, ToolResult};
pub use tools::{
    GeocodeRequest, GeocodeResponse, PoiResult, PoiSearchRequest, TriviaRequest, TriviaResponse,
    WikipediaRequest, WikipediaResponse,
};
