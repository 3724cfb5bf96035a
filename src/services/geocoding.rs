//! Geocoding service backed by OSM Nominatim.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::config::UpstreamConfig;
use crate::models::{GeocodeRequest, GeocodeResponse};
use crate::services::{decode_request, ServiceError, ServiceKind, ToolService};
use crate::utils::{HttpClient, RateLimiter};

/// Resolves place names to coordinates
#[derive(Debug)]
pub struct GeocodingService {
    client: HttpClient,
    base_url: String,
    rate_limiter: RateLimiter,
}

impl GeocodingService {
    /// Create a geocoding service from the upstream configuration
    pub fn new(upstream: &UpstreamConfig, requests_per_second: f64) -> Result<Self, ServiceError> {
        let client = HttpClient::with_user_agent(&upstream.user_agent(), upstream.timeout())?;
        Ok(Self {
            client,
            base_url: upstream.nominatim_url.trim_end_matches('/').to_string(),
            rate_limiter: RateLimiter::per_second(requests_per_second),
        })
    }

    /// Point the service at another Nominatim instance
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_rate_limiter(mut self, rate_limiter: RateLimiter) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    /// Resolve a location name to its best-matching coordinates
    pub async fn geocode(&self, request: &GeocodeRequest) -> Result<GeocodeResponse, ServiceError> {
        self.rate_limiter.wait().await;

        let url = format!("{}/search", self.base_url);
        let response = self
            .client
            .client()
            .get(&url)
            .query(&[
                ("q", request.location_name.as_str()),
                ("format", "json"),
                ("limit", "1"),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    tracing::error!(location = %request.location_name, "Timeout while geocoding");
                    ServiceError::Timeout("Geocoding".to_string())
                } else {
                    tracing::error!(location = %request.location_name, error = %e, "Geocoding request failed");
                    ServiceError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(
                location = %request.location_name,
                status = status.as_u16(),
                "HTTP error while geocoding"
            );
            return Err(ServiceError::Http(status.as_u16()));
        }

        let body = response.text().await?;
        let places: Vec<NominatimPlace> = serde_json::from_str(&body).map_err(|e| {
            tracing::error!(location = %request.location_name, error = %e, "Invalid JSON from Nominatim");
            ServiceError::Parse("Failed to parse JSON response from geocoding API".to_string())
        })?;

        let Some(place) = places.into_iter().next() else {
            tracing::warn!(location = %request.location_name, "Location not found");
            return Err(ServiceError::NotFound(format!(
                "Location not found: {}",
                request.location_name
            )));
        };

        place.into_response().ok_or_else(|| {
            tracing::error!(location = %request.location_name, "Unexpected response structure");
            ServiceError::Parse("Unexpected response structure".to_string())
        })
    }
}

#[async_trait]
impl ToolService for GeocodingService {
    fn kind(&self) -> ServiceKind {
        ServiceKind::Geocoding
    }

    fn description(&self) -> &str {
        "Resolve a location name to coordinates using OSM Nominatim"
    }

    fn request_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "location_name": {
                    "type": "string",
                    "description": "Place name to resolve (e.g., 'Rome', 'Eiffel Tower')"
                }
            },
            "required": ["location_name"]
        })
    }

    async fn invoke(&self, request: Value) -> Result<Value, ServiceError> {
        let request: GeocodeRequest = decode_request(request)?;
        let response = self.geocode(&request).await?;
        Ok(serde_json::to_value(response)?)
    }
}

// ===== Nominatim API Types =====

/// Nominatim returns coordinates as strings
#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: Option<Value>,
    lon: Option<Value>,
    display_name: Option<String>,
}

impl NominatimPlace {
    fn into_response(self) -> Option<GeocodeResponse> {
        Some(GeocodeResponse {
            lat: coordinate(self.lat?)?,
            lon: coordinate(self.lon?)?,
            display_name: self.display_name?,
        })
    }
}

fn coordinate(value: Value) -> Option<f64> {
    match value {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}
