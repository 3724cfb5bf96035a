//! HTTP surface over the orchestrator.
//!
//! - `POST /query` with `{"query": "..."}` returns the aggregate response
//! - `GET /health/{service}` runs the MCP handshake against one tool server

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::agent::Orchestrator;
use crate::models::{AgentQuery, AgentResponse};

/// Errors returned by the HTTP handlers
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Agent processing failed")]
    Processing,

    #[error("unknown service")]
    UnknownService,

    #[error("unhealthy")]
    Unhealthy,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Processing => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::UnknownService => StatusCode::NOT_FOUND,
            ApiError::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "detail": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}

/// Build the router with permissive CORS
pub fn router(orchestrator: Arc<Orchestrator>) -> Router {
    Router::new()
        .route("/query", post(query_handler))
        .route("/health/{service}", get(health_handler))
        .with_state(orchestrator)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Serve the router until the process is interrupted
pub async fn serve(orchestrator: Arc<Orchestrator>, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "HTTP API listening");

    axum::serve(listener, router(orchestrator))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
}

async fn query_handler(
    State(orchestrator): State<Arc<Orchestrator>>,
    Json(request): Json<AgentQuery>,
) -> Result<Json<AgentResponse>, ApiError> {
    orchestrator
        .handle_query(&request.query)
        .await
        .map(Json)
        .map_err(|e| {
            error!(error = %e, "Query failed");
            ApiError::Processing
        })
}

async fn health_handler(
    State(orchestrator): State<Arc<Orchestrator>>,
    Path(service): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let client = orchestrator
        .client(&service)
        .ok_or(ApiError::UnknownService)?;

    if client.health().await {
        Ok(Json(serde_json::json!({ "status": "ok" })))
    } else {
        Err(ApiError::Unhealthy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{ClientError, FallbackQueryParser, ToolCaller};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use std::collections::HashMap;
    use std::time::Duration;
    use tower::ServiceExt;

    #[derive(Debug)]
    struct StaticClient {
        data: Option<Value>,
    }

    #[async_trait]
    impl ToolCaller for StaticClient {
        async fn call(&self, _payload: Value) -> Result<Value, ClientError> {
            self.data
                .clone()
                .ok_or_else(|| ClientError::Tool("down".to_string()))
        }

        async fn health(&self) -> bool {
            self.data.is_some()
        }
    }

    fn app() -> Router {
        let mut clients: HashMap<String, Arc<dyn ToolCaller>> = HashMap::new();
        clients.insert(
            "geocoding".to_string(),
            Arc::new(StaticClient {
                data: Some(serde_json::json!({"lat": 1.0, "lon": 2.0})),
            }),
        );
        clients.insert(
            "poi".to_string(),
            Arc::new(StaticClient {
                data: Some(serde_json::json!([{"name": "Test"}])),
            }),
        );
        clients.insert("wikipedia".to_string(), Arc::new(StaticClient { data: None }));

        let orchestrator = Orchestrator::new(
            clients,
            Duration::from_secs(1),
            Arc::new(FallbackQueryParser),
        );
        router(Arc::new(orchestrator))
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_query_endpoint() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/query")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"query": "Rome"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let results = body["results"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["source"], "geocoding");
        assert_eq!(results[1]["data"][0]["name"], "Test");
    }

    #[tokio::test]
    async fn test_query_endpoint_empty_query() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/query")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"query": ""}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let sources: Vec<&str> = body["results"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["source"].as_str().unwrap())
            .collect();
        assert_eq!(sources, vec!["geocoding", "poi"]);
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let ok = app()
            .oneshot(Request::get("/health/geocoding").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(ok.status(), StatusCode::OK);
        assert_eq!(body_json(ok).await["status"], "ok");

        let down = app()
            .oneshot(Request::get("/health/wikipedia").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(down.status(), StatusCode::SERVICE_UNAVAILABLE);

        let unknown = app()
            .oneshot(Request::get("/health/weather").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(unknown).await["detail"], "unknown service");
    }
}
