//! Fan-out/fan-in workflow over the tool servers.
//!
//! ```text
//! parse ─► geocoding ─► poi ─┬─► wikipedia ─┐
//!                            └─► trivia ────┴─► AgentResponse
//! ```
//!
//! Geocoding and POI search run in sequence because the POI search needs
//! coordinates. Wikipedia and trivia then run concurrently. Every call has
//! its own timeout, and a failed or timed out call contributes nothing.

use futures_util::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use super::client::{ClientError, McpClient, ToolCaller};
use super::query_parser::{self, QueryParser};
use crate::config::Config;
use crate::models::{AgentResponse, ToolResult};
use crate::services::ServiceKind;

/// Failures of the request handler itself
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Failed to create client for '{service}': {source}")]
    Client {
        service: String,
        #[source]
        source: ClientError,
    },
}

/// Coordinates requests across the tool servers
#[derive(Debug, Clone)]
pub struct Orchestrator {
    clients: HashMap<String, Arc<dyn ToolCaller>>,
    timeout: Duration,
    parser: Arc<dyn QueryParser>,
}

impl Orchestrator {
    /// Create an orchestrator over named clients (`geocoding`, `poi`,
    /// `wikipedia` and optionally `trivia`)
    pub fn new(
        clients: HashMap<String, Arc<dyn ToolCaller>>,
        timeout: Duration,
        parser: Arc<dyn QueryParser>,
    ) -> Self {
        Self {
            clients,
            timeout,
            parser,
        }
    }

    /// Create an orchestrator with MCP clients for the configured servers
    pub fn from_config(config: &Config) -> Result<Self, AgentError> {
        let timeout = config.agent.timeout();
        let mut clients: HashMap<String, Arc<dyn ToolCaller>> = HashMap::new();

        for kind in ServiceKind::ALL {
            if kind == ServiceKind::Trivia && !config.agent.enable_trivia {
                continue;
            }
            let client = McpClient::for_service(kind, config.servers.url_for(kind), timeout)
                .map_err(|source| AgentError::Client {
                    service: kind.id().to_string(),
                    source,
                })?;
            clients.insert(kind.id().to_string(), Arc::new(client));
        }

        let parser = query_parser::from_config(&config.llm, timeout);
        Ok(Self::new(clients, timeout, parser))
    }

    /// Client registered under `name`
    pub fn client(&self, name: &str) -> Option<&Arc<dyn ToolCaller>> {
        self.clients.get(name)
    }

    /// Names of the registered clients, sorted
    pub fn client_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.clients.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Answer a free-text query with whatever the tool servers return
    pub async fn handle_query(&self, query: &str) -> Result<AgentResponse, AgentError> {
        let query = query.trim();
        info!(query, "Handling query");
        let mut results = Vec::new();

        let parsed = self.parser.parse(query).await;
        info!(location = %parsed.location, category = %parsed.category, "Parsed query");

        let geocode = self
            .call(
                ServiceKind::Geocoding.id(),
                serde_json::json!({ "location_name": parsed.location }),
            )
            .await;

        if let Some(geocode) = geocode {
            let coordinates = coordinates(&geocode);
            results.push(ToolResult::new(ServiceKind::Geocoding.id(), geocode));

            match coordinates {
                Some((lat, lon)) => {
                    let payload = serde_json::json!({
                        "latitude": lat,
                        "longitude": lon,
                        "category": parsed.category,
                    });
                    if let Some(pois) = self.call(ServiceKind::Poi.id(), payload).await {
                        results.push(ToolResult::new(ServiceKind::Poi.id(), pois));
                    }
                }
                None => warn!("Geocoding result has no coordinates, skipping POI search"),
            }
        }

        let mut optional = vec![(
            ServiceKind::Wikipedia.id(),
            serde_json::json!({ "poi_name": parsed.location }),
        )];
        if self.clients.contains_key(ServiceKind::Trivia.id()) {
            optional.push((
                ServiceKind::Trivia.id(),
                serde_json::json!({ "topic": parsed.location }),
            ));
        }

        let mut pending: FuturesUnordered<_> = optional
            .into_iter()
            .map(|(name, payload)| async move { (name, self.call(name, payload).await) })
            .collect();

        while let Some((name, data)) = pending.next().await {
            if let Some(data) = data {
                results.push(ToolResult::new(name, data));
            }
        }

        Ok(AgentResponse { results })
    }

    /// Call one tool with the per-call timeout; failures are logged and
    /// reported as `None`
    async fn call(&self, name: &str, payload: Value) -> Option<Value> {
        let Some(client) = self.clients.get(name) else {
            error!(service = name, "{}", ClientError::UnknownService(name.to_string()));
            return None;
        };

        match tokio::time::timeout(self.timeout, client.call(payload)).await {
            Ok(Ok(data)) => Some(data),
            Ok(Err(e)) => {
                error!(service = name, error = %e, "Tool call failed");
                None
            }
            Err(_) => {
                error!(service = name, timeout = ?self.timeout, "Tool call timed out");
                None
            }
        }
    }
}

/// `lat`/`lon` of a geocoding result, accepting numbers or numeric strings
fn coordinates(data: &Value) -> Option<(f64, f64)> {
    let number = |v: &Value| match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    Some((number(data.get("lat")?)?, number(data.get("lon")?)?))
}
