//! Tool server implementations wrapping public APIs.
//!
//! Each service resolves one kind of request against one upstream API:
//!
//! | Service     | Tool                 | Upstream                      |
//! |-------------|----------------------|-------------------------------|
//! | `geocoding` | `geocode_location`   | OSM Nominatim                 |
//! | `poi`       | `search_pois`        | Overpass API                  |
//! | `wikipedia` | `get_wikipedia_info` | Wikipedia REST + opensearch   |
//! | `trivia`    | `get_trivia`         | DuckDuckGo Instant Answer API |
//!
//! Every service owns a [`RateLimiter`](crate::utils::RateLimiter) and
//! reports any failure as a [`ServiceError`]. The MCP layer exposes each
//! service as exactly one tool through the [`ToolService`] trait.

mod geocoding;
mod poi;
mod registry;
mod trivia;
mod wikipedia;

pub use geocoding::GeocodingService;
pub use poi::{build_overpass_query, rank_pois, PoiService, MAX_POI_RESULTS};
pub use registry::{build_service, ServiceRegistry};
pub use trivia::{
    extract_fact, extract_fact_relaxed, extract_fact_strict, matches_context, score_source,
    TriviaCandidate, TriviaService, RELIABILITY_THRESHOLD,
};
pub use wikipedia::{summarize, WikipediaService, SUMMARY_MAX_CHARS};

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// The four tool servers of the travel agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    Geocoding,
    Poi,
    Wikipedia,
    Trivia,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 4] = [
        ServiceKind::Geocoding,
        ServiceKind::Poi,
        ServiceKind::Wikipedia,
        ServiceKind::Trivia,
    ];

    /// Service identifier, also used as the `source` of a tool result
    pub fn id(&self) -> &'static str {
        match self {
            ServiceKind::Geocoding => "geocoding",
            ServiceKind::Poi => "poi",
            ServiceKind::Wikipedia => "wikipedia",
            ServiceKind::Trivia => "trivia",
        }
    }

    /// Name of the single MCP tool the server exposes
    pub fn tool_name(&self) -> &'static str {
        match self {
            ServiceKind::Geocoding => "geocode_location",
            ServiceKind::Poi => "search_pois",
            ServiceKind::Wikipedia => "get_wikipedia_info",
            ServiceKind::Trivia => "get_trivia",
        }
    }

    /// Human-readable server name
    pub fn server_name(&self) -> &'static str {
        match self {
            ServiceKind::Geocoding => "Geocoding Server",
            ServiceKind::Poi => "POI Discovery Server",
            ServiceKind::Wikipedia => "Wikipedia Server",
            ServiceKind::Trivia => "Trivia Server",
        }
    }

    /// Port the server listens on by default
    pub fn default_port(&self) -> u16 {
        match self {
            ServiceKind::Geocoding => 8001,
            ServiceKind::Poi => 8002,
            ServiceKind::Wikipedia => 8003,
            ServiceKind::Trivia => 8004,
        }
    }

    /// Environment variable holding the server URL used by the orchestrator
    pub fn url_env_var(&self) -> &'static str {
        match self {
            ServiceKind::Geocoding => "GEOCODING_SERVER_URL",
            ServiceKind::Poi => "POI_SERVER_URL",
            ServiceKind::Wikipedia => "WIKIPEDIA_SERVER_URL",
            ServiceKind::Trivia => "TRIVIA_SERVER_URL",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ServiceKind {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ServiceKind::ALL
            .into_iter()
            .find(|k| k.id() == s)
            .ok_or_else(|| ServiceError::InvalidRequest(format!("Unknown service '{}'", s)))
    }
}

/// A tool server operation callable with a JSON request
#[async_trait]
pub trait ToolService: Send + Sync + std::fmt::Debug {
    /// Which server this is
    fn kind(&self) -> ServiceKind;

    /// Human-readable description of the tool
    fn description(&self) -> &str;

    /// JSON Schema of the request object
    fn request_schema(&self) -> Value;

    /// Run the operation on a JSON request and return a JSON response
    async fn invoke(&self, request: Value) -> Result<Value, ServiceError>;
}

/// Errors that can occur when calling an upstream API
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The upstream request timed out
    #[error("{0} request timed out")]
    Timeout(String),

    /// The upstream API answered with a non-success status
    #[error("HTTP error: {0}")]
    Http(u16),

    /// Connection or transport failure
    #[error("Network error: {0}")]
    Network(String),

    /// The upstream response could not be interpreted
    #[error("Invalid response: {0}")]
    Parse(String),

    /// The upstream API had no data for the request
    #[error("Not found: {0}")]
    NotFound(String),

    /// The best fact came from a source below the reliability threshold
    #[error("Low reliability source: {origin} ({score:.2})")]
    LowReliability { origin: String, score: f64 },

    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ServiceError::Timeout("Upstream".to_string())
        } else if let Some(status) = err.status() {
            ServiceError::Http(status.as_u16())
        } else if err.is_decode() {
            ServiceError::Parse(err.to_string())
        } else {
            ServiceError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::Parse(format!("JSON: {}", err))
    }
}

/// Decode a tool request, accepting both `{"request": {...}}` and the bare object
pub(crate) fn decode_request<T: serde::de::DeserializeOwned>(
    value: Value,
) -> Result<T, ServiceError> {
    let inner = match value {
        Value::Object(mut map) if map.contains_key("request") && map.len() == 1 => {
            map.remove("request").unwrap_or(Value::Null)
        }
        other => other,
    };

    serde_json::from_value(inner).map_err(|e| ServiceError::InvalidRequest(e.to_string()))
}
