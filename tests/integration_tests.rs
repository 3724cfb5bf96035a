//! Integration tests for the travel agent
//!
//! These tests exercise the orchestrator, the MCP tool servers and the HTTP
//! surface together, with upstream APIs replaced by mock servers.

use async_trait::async_trait;
use mockito::Matcher;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use travel_agent::agent::{ClientError, FallbackQueryParser, McpClient, Orchestrator, ToolCaller};
use travel_agent::config::{Config, UpstreamConfig};
use travel_agent::mcp::{McpServer, ToolRegistry};
use travel_agent::services::{
    GeocodingService, PoiService, ServiceKind, ToolService, TriviaService, WikipediaService,
};
use travel_agent::utils::{haversine, ManualClock, RateLimiter};

/// Tool caller returning a fixed payload
#[derive(Debug)]
struct StaticCaller(Value);

#[async_trait]
impl ToolCaller for StaticCaller {
    async fn call(&self, _payload: Value) -> Result<Value, ClientError> {
        Ok(self.0.clone())
    }

    async fn health(&self) -> bool {
        true
    }
}

/// Tool caller that forwards to an in-process tool registry
#[derive(Debug)]
struct RegistryCaller {
    tools: ToolRegistry,
    tool_name: String,
}

#[async_trait]
impl ToolCaller for RegistryCaller {
    async fn call(&self, payload: Value) -> Result<Value, ClientError> {
        self.tools
            .execute(&self.tool_name, json!({ "request": payload }))
            .await
            .map_err(ClientError::Tool)
    }

    async fn health(&self) -> bool {
        true
    }
}

fn registry_caller(service: Arc<dyn ToolService>) -> Arc<dyn ToolCaller> {
    let tool_name = service.kind().tool_name().to_string();
    Arc::new(RegistryCaller {
        tools: ToolRegistry::for_service(service),
        tool_name,
    })
}

fn upstream() -> UpstreamConfig {
    UpstreamConfig {
        contact_email: "tests@example.com".to_string(),
        ..UpstreamConfig::default()
    }
}

#[tokio::test]
async fn test_end_to_end_rome_three_results() {
    let mut clients: HashMap<String, Arc<dyn ToolCaller>> = HashMap::new();
    clients.insert(
        "geocoding".to_string(),
        Arc::new(StaticCaller(json!({"lat": 1.0, "lon": 2.0}))),
    );
    clients.insert(
        "poi".to_string(),
        Arc::new(StaticCaller(json!([{"name": "Test"}]))),
    );
    clients.insert(
        "wikipedia".to_string(),
        Arc::new(StaticCaller(json!({"summary": "info"}))),
    );

    let orchestrator =
        Orchestrator::new(clients, Duration::from_secs(2), Arc::new(FallbackQueryParser));
    let response = orchestrator.handle_query("Rome").await.unwrap();

    assert_eq!(response.results.len(), 3);
    let mut sources = response.sources();
    sources.sort_unstable();
    assert_eq!(sources, vec!["geocoding", "poi", "wikipedia"]);
    assert_eq!(response.get("poi").unwrap().data[0]["name"], "Test");
    assert_eq!(response.get("wikipedia").unwrap().data["summary"], "info");
}

#[tokio::test]
async fn test_pipeline_through_tool_services() {
    let mut upstream_server = mockito::Server::new_async().await;
    let base = upstream_server.url();

    upstream_server
        .mock("GET", "/search")
        .match_query(Matcher::UrlEncoded("q".into(), "Rome".into()))
        .with_status(200)
        .with_body(r#"[{"lat": "41.8933", "lon": "12.4829", "display_name": "Roma, Lazio, Italia"}]"#)
        .create_async()
        .await;
    upstream_server
        .mock("POST", "/api/interpreter")
        .match_body(Matcher::Regex(r#"node\["tourism"\]\(around:5000,41.8933,12.4829\)"#.to_string()))
        .with_status(200)
        .with_body(
            json!({
                "elements": [
                    {"type": "node", "lat": 41.8986, "lon": 12.4769,
                     "tags": {"name": "Pantheon", "importance": "0.9"}},
                    {"type": "way", "center": {"lat": 41.8902, "lon": 12.4922},
                     "tags": {"name": "Colosseum", "importance": "0.95"}},
                    {"type": "node", "lat": 41.8935, "lon": 12.4830,
                     "tags": {"name": "Kiosk"}}
                ]
            })
            .to_string(),
        )
        .create_async()
        .await;
    upstream_server
        .mock("GET", "/api/rest_v1/page/summary/Rome")
        .with_status(200)
        .with_body(
            json!({
                "title": "Rome",
                "extract": "Rome is the capital city of Italy.",
                "pageid": 25458,
                "content_urls": {"desktop": {"page": "https://en.wikipedia.org/wiki/Rome"}}
            })
            .to_string(),
        )
        .create_async()
        .await;
    upstream_server
        .mock("GET", "/ddg/")
        .match_query(Matcher::UrlEncoded("q".into(), "Rome".into()))
        .with_status(200)
        .with_body(
            json!({
                "AbstractText": "Rome is a popular destination with thousands of monuments.",
                "AbstractSource": "Wikipedia",
                "AbstractURL": "https://en.wikipedia.org/wiki/Rome"
            })
            .to_string(),
        )
        .create_async()
        .await;

    let upstream = upstream();
    let geocoding = GeocodingService::new(&upstream, 1.0)
        .unwrap()
        .with_base_url(&base)
        .with_rate_limiter(RateLimiter::unlimited());
    let poi = PoiService::new(&upstream, 1.0)
        .unwrap()
        .with_overpass_url(format!("{}/api/interpreter", base))
        .with_rate_limiter(RateLimiter::unlimited());
    let wikipedia = WikipediaService::new(&upstream, 1.0)
        .unwrap()
        .with_base_url(&base)
        .with_rate_limiter(RateLimiter::unlimited());
    let trivia = TriviaService::new(&upstream, 1.0)
        .unwrap()
        .with_base_url(format!("{}/ddg/", base))
        .with_rate_limiter(RateLimiter::unlimited());

    let mut clients: HashMap<String, Arc<dyn ToolCaller>> = HashMap::new();
    clients.insert("geocoding".to_string(), registry_caller(Arc::new(geocoding)));
    clients.insert("poi".to_string(), registry_caller(Arc::new(poi)));
    clients.insert("wikipedia".to_string(), registry_caller(Arc::new(wikipedia)));
    clients.insert("trivia".to_string(), registry_caller(Arc::new(trivia)));

    let orchestrator =
        Orchestrator::new(clients, Duration::from_secs(5), Arc::new(FallbackQueryParser));
    let response = orchestrator.handle_query("Rome").await.unwrap();

    assert_eq!(response.results.len(), 4);

    let geocode = &response.get("geocoding").unwrap().data;
    assert_eq!(geocode["display_name"], "Roma, Lazio, Italia");

    let pois = response.get("poi").unwrap().data.as_array().unwrap().clone();
    let names: Vec<&str> = pois.iter().map(|p| p["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["Colosseum", "Pantheon", "Kiosk"]);
    assert_eq!(pois[1]["type"], "node");
    assert!(pois[0]["distance"].as_f64().unwrap() > 0.0);

    let wiki = &response.get("wikipedia").unwrap().data;
    assert_eq!(wiki["title"], "Rome");
    assert_eq!(wiki["page_id"], 25458);

    let fact = &response.get("trivia").unwrap().data;
    assert_eq!(fact["source"], "Wikipedia");
    assert_eq!(fact["reliability"], 0.9);
}

#[tokio::test]
async fn test_pipeline_tolerates_upstream_failures() {
    let mut upstream_server = mockito::Server::new_async().await;
    let base = upstream_server.url();

    upstream_server
        .mock("GET", "/search")
        .match_query(Matcher::Any)
        .with_status(503)
        .create_async()
        .await;
    upstream_server
        .mock("GET", "/api/rest_v1/page/summary/Rome")
        .with_status(200)
        .with_body(r#"{"title": "Rome", "extract": "Rome is the capital city of Italy."}"#)
        .create_async()
        .await;

    let upstream = upstream();
    let geocoding = GeocodingService::new(&upstream, 1.0)
        .unwrap()
        .with_base_url(&base)
        .with_rate_limiter(RateLimiter::unlimited());
    let wikipedia = WikipediaService::new(&upstream, 1.0)
        .unwrap()
        .with_base_url(&base)
        .with_rate_limiter(RateLimiter::unlimited());

    let mut clients: HashMap<String, Arc<dyn ToolCaller>> = HashMap::new();
    clients.insert("geocoding".to_string(), registry_caller(Arc::new(geocoding)));
    clients.insert(
        "poi".to_string(),
        Arc::new(StaticCaller(json!([{"name": "never used"}]))),
    );
    clients.insert("wikipedia".to_string(), registry_caller(Arc::new(wikipedia)));

    let orchestrator =
        Orchestrator::new(clients, Duration::from_secs(5), Arc::new(FallbackQueryParser));
    let response = orchestrator.handle_query("Rome").await.unwrap();

    assert_eq!(response.sources(), vec!["wikipedia"]);
    assert_eq!(
        response.get("wikipedia").unwrap().data["url"],
        "https://en.wikipedia.org/wiki/Rome"
    );
}

#[tokio::test]
async fn test_mcp_server_and_client_round_trip() {
    let mut upstream_server = mockito::Server::new_async().await;
    upstream_server
        .mock("GET", "/search")
        .match_query(Matcher::UrlEncoded("q".into(), "Oslo".into()))
        .with_status(200)
        .with_body(r#"[{"lat": "59.9133", "lon": "10.7389", "display_name": "Oslo, Norge"}]"#)
        .create_async()
        .await;

    let service = GeocodingService::new(&upstream(), 1.0)
        .unwrap()
        .with_base_url(upstream_server.url())
        .with_rate_limiter(RateLimiter::unlimited());
    let server = McpServer::new(Arc::new(service)).unwrap();
    assert_eq!(server.kind(), ServiceKind::Geocoding);

    let (addr, handle) = server.run_http("127.0.0.1:0").await.unwrap();
    let client = McpClient::for_service(
        ServiceKind::Geocoding,
        format!("http://{}", addr),
        Duration::from_secs(5),
    )
    .unwrap();

    assert!(client.health().await);

    let value = client.call(json!({"location_name": "Oslo"})).await.unwrap();
    assert_eq!(value["lat"], 59.9133);
    assert_eq!(value["lon"], 10.7389);
    assert_eq!(value["display_name"], "Oslo, Norge");

    handle.abort();
}

#[tokio::test]
async fn test_unreachable_servers_yield_empty_response() {
    let mut config = Config::default();
    for kind in ServiceKind::ALL {
        let url = format!("http://127.0.0.1:9/{}", kind.id());
        match kind {
            ServiceKind::Geocoding => config.servers.geocoding = url,
            ServiceKind::Poi => config.servers.poi = url,
            ServiceKind::Wikipedia => config.servers.wikipedia = url,
            ServiceKind::Trivia => config.servers.trivia = url,
        }
    }
    config.agent.timeout_secs = 2;
    config.llm.api_key = None;

    let orchestrator = Orchestrator::from_config(&config).unwrap();
    let response = orchestrator.handle_query("Rome").await.unwrap();

    assert!(response.results.is_empty());
    assert!(!orchestrator.client("geocoding").unwrap().health().await);
}

#[tokio::test]
async fn test_geocoding_calls_are_rate_limited() {
    let mut upstream_server = mockito::Server::new_async().await;
    let mock = upstream_server
        .mock("GET", "/search")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"[{"lat": "48.8566", "lon": "2.3522", "display_name": "Paris"}]"#)
        .expect(3)
        .create_async()
        .await;

    let clock = Arc::new(ManualClock::new());
    let service = GeocodingService::new(&upstream(), 1.0)
        .unwrap()
        .with_base_url(upstream_server.url())
        .with_rate_limiter(RateLimiter::with_clock(Duration::from_secs(1), clock.clone()));
    let tools = ToolRegistry::for_service(Arc::new(service));

    for _ in 0..3 {
        let value = tools
            .execute("geocode_location", json!({"location_name": "Paris"}))
            .await
            .unwrap();
        assert_eq!(value["lat"], 48.8566);
    }

    assert_eq!(clock.elapsed(), Duration::from_secs(2));
    mock.assert_async().await;
}

#[test]
fn test_haversine_hundredth_of_a_degree() {
    let distance = haversine(0.0, 0.0, 0.01, 0.0);
    assert!((distance - 1111.95).abs() < 0.1);
    assert_eq!(haversine(41.9, 12.5, 41.9, 12.5), 0.0);
}
