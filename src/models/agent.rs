//! Agent query and aggregate response models.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Natural language query issued by a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentQuery {
    /// User request to be routed to the tool servers
    pub query: String,
}

/// POI categories understood by the POI discovery server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    Tourism,
    Historic,
    Restaurant,
    Entertainment,
    Shopping,
}

impl Category {
    /// All categories, in the order they are offered to the language model
    pub const ALL: [Category; 5] = [
        Category::Tourism,
        Category::Historic,
        Category::Restaurant,
        Category::Entertainment,
        Category::Shopping,
    ];

    /// Wire name of the category
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Tourism => "tourism",
            Category::Historic => "historic",
            Category::Restaurant => "restaurant",
            Category::Entertainment => "entertainment",
            Category::Shopping => "shopping",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| format!("Unknown category: {}", s))
    }
}

/// Structured parameters extracted from a free-text query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedQuery {
    /// Place the user is asking about
    pub location: String,

    /// Kind of POI the user is interested in
    pub category: Category,
}

impl ParsedQuery {
    /// Fallback used when the query cannot be interpreted: the raw query
    /// becomes the location and the category is `tourism`
    pub fn fallback(query: &str) -> Self {
        Self {
            location: query.to_string(),
            category: Category::Tourism,
        }
    }
}

/// Result returned by one tool server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Name of the service producing the result
    pub source: String,

    /// Structured content returned by the tool
    #[serde(default)]
    pub data: serde_json::Value,
}

impl ToolResult {
    pub fn new(source: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            source: source.into(),
            data,
        }
    }
}

/// Aggregate response from the orchestrator
///
/// Results appear in the order the calls completed. The concurrent segment
/// (Wikipedia, trivia) can complete in either order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    #[serde(default)]
    pub results: Vec<ToolResult>,
}

impl AgentResponse {
    /// Sources that contributed a result
    pub fn sources(&self) -> Vec<&str> {
        self.results.iter().map(|r| r.source.as_str()).collect()
    }

    /// Result contributed by a given source, if any
    pub fn get(&self, source: &str) -> Option<&ToolResult> {
        self.results.iter().find(|r| r.source == source)
    }
}
