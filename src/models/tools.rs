//! Request and response payloads of the four tool servers.

use serde::{Deserialize, Serialize};

use super::Category;

/// Geocoding request: resolve a place name to coordinates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodeRequest {
    pub location_name: String,
}

/// Geocoding result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeResponse {
    pub lat: f64,
    pub lon: f64,
    pub display_name: String,
}

/// POI discovery request
///
/// `radius` (meters) is applied by the upstream spatial query; it must lie
/// within [`PoiSearchRequest::MIN_RADIUS`] and [`PoiSearchRequest::MAX_RADIUS`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoiSearchRequest {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub category: Category,
    #[serde(default = "default_radius")]
    pub radius: u32,
}

impl PoiSearchRequest {
    pub const MIN_RADIUS: u32 = 100;
    pub const MAX_RADIUS: u32 = 50_000;
    pub const DEFAULT_RADIUS: u32 = 5_000;

    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            category: Category::default(),
            radius: Self::DEFAULT_RADIUS,
        }
    }

    pub fn category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    pub fn radius(mut self, radius: u32) -> Self {
        self.radius = radius;
        self
    }
}

fn default_radius() -> u32 {
    PoiSearchRequest::DEFAULT_RADIUS
}

/// A point of interest with its distance from the search center
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoiResult {
    pub name: Option<String>,
    pub lat: f64,
    pub lon: f64,
    /// OSM element type (node, way, relation)
    #[serde(rename = "type")]
    pub kind: String,
    /// Great-circle distance from the search center in meters
    pub distance: f64,
    /// Notability score in [0, 1]
    #[serde(default)]
    pub importance: f64,
}

/// Wikipedia lookup request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WikipediaRequest {
    /// Name of the place or point of interest to look up
    pub poi_name: String,
    /// Disambiguation hint such as "Paris, France"
    #[serde(default)]
    pub location_context: Option<String>,
}

/// Wikipedia article content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WikipediaResponse {
    /// Extract truncated to a short teaser
    pub summary: String,
    pub extract: String,
    pub url: String,
    #[serde(default)]
    pub page_id: Option<i64>,
    pub title: String,
}

/// Trivia lookup request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriviaRequest {
    pub topic: String,
    /// Optional travel context such as a city or country
    #[serde(default)]
    pub context: Option<String>,
}

impl TriviaRequest {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            context: None,
        }
    }

    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// A trivia fact with its provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriviaResponse {
    pub trivia: String,
    pub source: String,
    #[serde(default)]
    pub url: Option<String>,
    /// Source reliability between 0 and 1
    pub reliability: f64,
}
