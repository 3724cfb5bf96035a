//! POI discovery service backed by the Overpass API.
//!
//! Radius filtering happens upstream (`around:` in the Overpass query); this
//! service computes exact Haversine distances for the returned elements,
//! scores their importance and ranks them.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::config::UpstreamConfig;
use crate::models::{Category, PoiResult, PoiSearchRequest};
use crate::services::{decode_request, ServiceError, ServiceKind, ToolService};
use crate::utils::{haversine, HttpClient, RateLimiter};

/// Maximum number of POIs returned per search
pub const MAX_POI_RESULTS: usize = 20;

/// Discovers points of interest around a coordinate
#[derive(Debug)]
pub struct PoiService {
    client: HttpClient,
    overpass_url: String,
    rate_limiter: RateLimiter,
}

impl PoiService {
    pub fn new(upstream: &UpstreamConfig, requests_per_second: f64) -> Result<Self, ServiceError> {
        let client = HttpClient::with_user_agent(&upstream.user_agent(), upstream.timeout())?;
        Ok(Self {
            client,
            overpass_url: upstream.overpass_url.clone(),
            rate_limiter: RateLimiter::per_second(requests_per_second),
        })
    }

    /// Point the service at another Overpass interpreter endpoint
    pub fn with_overpass_url(mut self, url: impl Into<String>) -> Self {
        self.overpass_url = url.into();
        self
    }

    pub fn with_rate_limiter(mut self, rate_limiter: RateLimiter) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    /// Search POIs, ranked by importance then distance
    pub async fn search(&self, request: &PoiSearchRequest) -> Result<Vec<PoiResult>, ServiceError> {
        if !(PoiSearchRequest::MIN_RADIUS..=PoiSearchRequest::MAX_RADIUS).contains(&request.radius)
        {
            return Err(ServiceError::InvalidRequest(format!(
                "radius must be between {} and {} meters, got {}",
                PoiSearchRequest::MIN_RADIUS,
                PoiSearchRequest::MAX_RADIUS,
                request.radius
            )));
        }

        let query = build_overpass_query(
            request.latitude,
            request.longitude,
            request.radius,
            request.category,
        );

        self.rate_limiter.wait().await;

        let response = self
            .client
            .client()
            .post(&self.overpass_url)
            .body(query)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Overpass request failed");
                if e.is_timeout() {
                    ServiceError::Timeout("POI search".to_string())
                } else {
                    ServiceError::Network(format!("POI search failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(status = status.as_u16(), "Overpass request failed");
            return Err(ServiceError::Http(status.as_u16()));
        }

        let body = response.text().await?;
        let data: OverpassResponse = serde_json::from_str(&body).map_err(|e| {
            tracing::error!(error = %e, "Invalid Overpass response");
            ServiceError::Parse("Invalid response from Overpass API".to_string())
        })?;

        let results = data
            .elements
            .into_iter()
            .filter_map(|el| el.into_poi(request.latitude, request.longitude))
            .collect();

        Ok(rank_pois(results))
    }
}

#[async_trait]
impl ToolService for PoiService {
    fn kind(&self) -> ServiceKind {
        ServiceKind::Poi
    }

    fn description(&self) -> &str {
        "Discover points of interest near a coordinate, ranked by importance and distance"
    }

    fn request_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "latitude": { "type": "number" },
                "longitude": { "type": "number" },
                "category": {
                    "type": "string",
                    "enum": Category::ALL.iter().map(|c| c.as_str()).collect::<Vec<_>>(),
                    "default": "tourism"
                },
                "radius": {
                    "type": "integer",
                    "description": "Search radius in meters",
                    "minimum": PoiSearchRequest::MIN_RADIUS,
                    "maximum": PoiSearchRequest::MAX_RADIUS,
                    "default": PoiSearchRequest::DEFAULT_RADIUS
                }
            },
            "required": ["latitude", "longitude"]
        })
    }

    async fn invoke(&self, request: Value) -> Result<Value, ServiceError> {
        let request: PoiSearchRequest = decode_request(request)?;
        let results = self.search(&request).await?;
        Ok(serde_json::to_value(results)?)
    }
}

/// Overpass tag filter for a category
fn category_filter(category: Category) -> &'static str {
    match category {
        Category::Tourism => r#"["tourism"]"#,
        Category::Historic => r#"["historic"]"#,
        Category::Restaurant => r#"["amenity"="restaurant"]"#,
        Category::Entertainment => r#"["amenity"~"theatre|cinema|nightclub|arts_centre"]"#,
        Category::Shopping => r#"["shop"]"#,
    }
}

/// Overpass QL query for nodes, ways and relations within `radius` meters
pub fn build_overpass_query(lat: f64, lon: f64, radius: u32, category: Category) -> String {
    let filter = category_filter(category);
    format!(
        "[out:json][timeout:25];\n\
         (\n  \
           node{filter}(around:{radius},{lat},{lon});\n  \
           way{filter}(around:{radius},{lat},{lon});\n  \
           relation{filter}(around:{radius},{lat},{lon});\n\
         );\n\
         out center;"
    )
}

/// Sort by descending importance, then ascending distance, keeping the top results
pub fn rank_pois(mut results: Vec<PoiResult>) -> Vec<PoiResult> {
    results.sort_by(|a, b| {
        b.importance
            .total_cmp(&a.importance)
            .then_with(|| a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal))
    });
    results.truncate(MAX_POI_RESULTS);
    results
}

/// Importance in [0, 1]: an explicit numeric `importance` tag, otherwise a
/// score from notability tags
fn importance(tags: &HashMap<String, String>) -> f64 {
    if let Some(explicit) = tags
        .get("importance")
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
    {
        return explicit.clamp(0.0, 1.0);
    }

    let mut score: f64 = 0.0;
    if tags.contains_key("name") {
        score += 0.1;
    }
    if tags.contains_key("wikipedia") {
        score += 0.4;
    }
    if tags.contains_key("wikidata") {
        score += 0.2;
    }
    if tags.contains_key("heritage") {
        score += 0.2;
    }
    if tags.contains_key("website") {
        score += 0.1;
    }
    score.min(1.0)
}

// ===== Overpass API Types =====

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<OverpassElement>,
}

#[derive(Debug, Deserialize)]
struct OverpassElement {
    #[serde(rename = "type", default = "default_element_type")]
    kind: String,
    lat: Option<f64>,
    lon: Option<f64>,
    center: Option<OverpassCenter>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct OverpassCenter {
    lat: Option<f64>,
    lon: Option<f64>,
}

fn default_element_type() -> String {
    "node".to_string()
}

impl OverpassElement {
    /// Nodes carry `lat`/`lon`; ways and relations carry a `center`
    fn into_poi(self, origin_lat: f64, origin_lon: f64) -> Option<PoiResult> {
        let lat = self.lat.or_else(|| self.center.as_ref().and_then(|c| c.lat))?;
        let lon = self.lon.or_else(|| self.center.as_ref().and_then(|c| c.lon))?;

        Some(PoiResult {
            importance: importance(&self.tags),
            name: self.tags.get("name").cloned(),
            lat,
            lon,
            kind: self.kind,
            distance: haversine(origin_lat, origin_lon, lat, lon),
        })
    }
}
