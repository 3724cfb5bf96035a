//! Wikipedia enrichment service.
//!
//! Article lookup walks a fallback chain, stopping at the first page summary
//! that resolves:
//!
//! 1. REST summary for `"<poi_name> <location_context>"`
//! 2. REST summary for `"<poi_name>"` alone (only when a context was given)
//! 3. opensearch for the best matching title, then its REST summary

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::config::UpstreamConfig;
use crate::models::{WikipediaRequest, WikipediaResponse};
use crate::services::{decode_request, ServiceError, ServiceKind, ToolService};
use crate::utils::{HttpClient, RateLimiter};

/// Characters kept in the `summary` teaser before `...` is appended
pub const SUMMARY_MAX_CHARS: usize = 200;

/// Fetches article summaries for points of interest
#[derive(Debug)]
pub struct WikipediaService {
    client: HttpClient,
    base_url: String,
    rate_limiter: RateLimiter,
}

impl WikipediaService {
    pub fn new(upstream: &UpstreamConfig, requests_per_second: f64) -> Result<Self, ServiceError> {
        let client = HttpClient::with_user_agent(&upstream.user_agent(), upstream.timeout())?;
        Ok(Self {
            client,
            base_url: upstream.wikipedia_url.trim_end_matches('/').to_string(),
            rate_limiter: RateLimiter::per_second(requests_per_second),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_rate_limiter(mut self, rate_limiter: RateLimiter) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    /// Look up the article best matching the request
    pub async fn lookup(&self, request: &WikipediaRequest) -> Result<WikipediaResponse, ServiceError> {
        self.rate_limiter.wait().await;

        tracing::info!(poi = %request.poi_name, "Searching Wikipedia");
        let page = self.search(request).await?;

        let extract = page.extract.ok_or_else(|| {
            ServiceError::NotFound(format!(
                "No Wikipedia article found for '{}'",
                request.poi_name
            ))
        })?;

        let title = page
            .title
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| request.poi_name.clone());

        let url = page
            .content_urls
            .and_then(|u| u.desktop)
            .and_then(|d| d.page)
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| format!("https://en.wikipedia.org/wiki/{}", title.replace(' ', "_")));

        Ok(WikipediaResponse {
            summary: summarize(&extract),
            extract,
            url,
            page_id: page.pageid,
            title,
        })
    }

    async fn search(&self, request: &WikipediaRequest) -> Result<PageSummary, ServiceError> {
        let query = match request.location_context.as_deref().map(str::trim) {
            Some(context) if !context.is_empty() => format!("{} {}", request.poi_name, context),
            _ => request.poi_name.clone(),
        };

        if let Some(page) = self.page_summary(&query).await? {
            return Ok(page);
        }

        if query != request.poi_name {
            tracing::debug!(poi = %request.poi_name, "Retrying Wikipedia without location context");
            if let Some(page) = self.page_summary(&request.poi_name).await? {
                return Ok(page);
            }
        }

        tracing::debug!(query = %query, "Falling back to Wikipedia opensearch");
        if let Some(title) = self.opensearch(&query).await {
            if let Some(page) = self.page_summary(&title).await? {
                return Ok(page);
            }
        }

        Err(ServiceError::NotFound(format!(
            "No Wikipedia article found for '{}'",
            request.poi_name
        )))
    }

    /// REST page summary; `None` when the page does not resolve
    async fn page_summary(&self, title: &str) -> Result<Option<PageSummary>, ServiceError> {
        let url = format!(
            "{}/api/rest_v1/page/summary/{}",
            self.base_url,
            urlencoding::encode(&title.replace(' ', "_"))
        );

        let response = match self
            .client
            .client()
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                tracing::warn!(title = %title, "Timeout while fetching Wikipedia summary");
                return Ok(None);
            }
            Err(e) => {
                tracing::debug!(title = %title, error = %e, "Wikipedia summary request failed");
                return Ok(None);
            }
        };

        if !response.status().is_success() {
            tracing::debug!(title = %title, status = response.status().as_u16(), "No Wikipedia summary");
            return Ok(None);
        }

        let body = response.text().await?;
        let page = serde_json::from_str(&body).map_err(|e| {
            tracing::error!(title = %title, error = %e, "Invalid Wikipedia response");
            ServiceError::Parse("Invalid response from Wikipedia API".to_string())
        })?;

        Ok(Some(page))
    }

    /// Best matching article title from opensearch
    async fn opensearch(&self, query: &str) -> Option<String> {
        let url = format!("{}/w/api.php", self.base_url);

        let response = self
            .client
            .client()
            .get(&url)
            .query(&[
                ("action", "opensearch"),
                ("search", query),
                ("limit", "1"),
                ("format", "json"),
            ])
            .send()
            .await
            .ok()?
            .error_for_status()
            .ok()?;

        // [query, [titles...], [descriptions...], [urls...]]
        let data: Value = response.json().await.ok()?;
        data.get(1)?
            .as_array()?
            .first()?
            .as_str()
            .map(|s| s.to_string())
    }
}

#[async_trait]
impl ToolService for WikipediaService {
    fn kind(&self) -> ServiceKind {
        ServiceKind::Wikipedia
    }

    fn description(&self) -> &str {
        "Fetch a Wikipedia summary for a point of interest"
    }

    fn request_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "poi_name": {
                    "type": "string",
                    "description": "Name of the point of interest to look up"
                },
                "location_context": {
                    "type": "string",
                    "description": "Location context to help disambiguate (e.g., 'Paris, France')"
                }
            },
            "required": ["poi_name"]
        })
    }

    async fn invoke(&self, request: Value) -> Result<Value, ServiceError> {
        let request: WikipediaRequest = decode_request(request)?;
        let response = self.lookup(&request).await?;
        Ok(serde_json::to_value(response)?)
    }
}

/// Truncate an extract to [`SUMMARY_MAX_CHARS`] characters, appending `...` when cut
pub fn summarize(extract: &str) -> String {
    match extract.char_indices().nth(SUMMARY_MAX_CHARS) {
        Some((idx, _)) => format!("{}...", &extract[..idx]),
        None => extract.to_string(),
    }
}

// ===== Wikipedia REST Types =====

#[derive(Debug, Deserialize)]
struct PageSummary {
    title: Option<String>,
    extract: Option<String>,
    pageid: Option<i64>,
    content_urls: Option<ContentUrls>,
}

#[derive(Debug, Deserialize)]
struct ContentUrls {
    desktop: Option<PageUrl>,
}

#[derive(Debug, Deserialize)]
struct PageUrl {
    page: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use std::time::Duration;

    fn service(base_url: &str) -> WikipediaService {
        WikipediaService::new(&UpstreamConfig::default(), 1.0)
            .unwrap()
            .with_base_url(base_url)
            .with_rate_limiter(RateLimiter::unlimited())
    }

    /// Upstream that never answers summaries for titles containing `stall`
    /// and serves `body` for everything else
    async fn stalling_upstream(stall: &'static str, body: String) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let body = body.clone();
                tokio::spawn(async move {
                    let mut request = Vec::new();
                    let mut buf = [0u8; 1024];
                    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => request.extend_from_slice(&buf[..n]),
                        }
                    }

                    let request = String::from_utf8_lossy(&request);
                    let request_line = request.lines().next().unwrap_or("");
                    if request_line.contains(stall) {
                        tokio::time::sleep(Duration::from_secs(30)).await;
                        return;
                    }

                    let response = format!(
                        "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                });
            }
        });

        format!("http://{}", addr)
    }

    fn eiffel_summary() -> String {
        serde_json::json!({
            "title": "Eiffel Tower",
            "extract": "The Eiffel Tower is a wrought-iron lattice tower on the Champ de Mars in Paris, France.",
            "pageid": 9202,
            "content_urls": {"desktop": {"page": "https://en.wikipedia.org/wiki/Eiffel_Tower"}}
        })
        .to_string()
    }

    #[test]
    fn test_summarize_short_text_unchanged() {
        assert_eq!(summarize("Short extract."), "Short extract.");
        assert_eq!(summarize(""), "");
    }

    #[test]
    fn test_summarize_truncates_long_text() {
        let long = "a".repeat(250);
        let summary = summarize(&long);
        assert_eq!(summary.len(), SUMMARY_MAX_CHARS + 3);
        assert!(summary.ends_with("..."));

        let exact = "b".repeat(SUMMARY_MAX_CHARS);
        assert_eq!(summarize(&exact), exact);
    }

    #[test]
    fn test_summarize_respects_char_boundaries() {
        let text = "é".repeat(201);
        let summary = summarize(&text);
        assert_eq!(summary.chars().count(), SUMMARY_MAX_CHARS + 3);
    }

    #[tokio::test]
    async fn test_lookup_direct_hit() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/rest_v1/page/summary/Eiffel_Tower_Paris")
            .with_status(200)
            .with_body(eiffel_summary())
            .create_async()
            .await;

        let request = WikipediaRequest {
            poi_name: "Eiffel Tower".to_string(),
            location_context: Some("Paris".to_string()),
        };
        let result = service(&server.url()).lookup(&request).await.unwrap();

        assert!(result.extract.contains("Eiffel Tower"));
        assert_eq!(result.url, "https://en.wikipedia.org/wiki/Eiffel_Tower");
        assert_eq!(result.page_id, Some(9202));
        assert_eq!(result.title, "Eiffel Tower");
    }

    #[tokio::test]
    async fn test_lookup_continues_after_summary_timeout() {
        let base_url = stalling_upstream("Eiffel_Tower_Paris", eiffel_summary()).await;
        let upstream = UpstreamConfig {
            timeout_secs: 1,
            ..UpstreamConfig::default()
        };
        let service = WikipediaService::new(&upstream, 1.0)
            .unwrap()
            .with_base_url(base_url)
            .with_rate_limiter(RateLimiter::unlimited());

        let request = WikipediaRequest {
            poi_name: "Eiffel Tower".to_string(),
            location_context: Some("Paris".to_string()),
        };
        let result = service.lookup(&request).await.unwrap();

        assert_eq!(result.title, "Eiffel Tower");
        assert_eq!(result.page_id, Some(9202));
    }

    #[tokio::test]
    async fn test_lookup_falls_back_to_name_without_context() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/rest_v1/page/summary/Eiffel_Tower_Paris")
            .with_status(404)
            .create_async()
            .await;
        let name_only = server
            .mock("GET", "/api/rest_v1/page/summary/Eiffel_Tower")
            .with_status(200)
            .with_body(eiffel_summary())
            .create_async()
            .await;

        let request = WikipediaRequest {
            poi_name: "Eiffel Tower".to_string(),
            location_context: Some("Paris".to_string()),
        };
        let result = service(&server.url()).lookup(&request).await.unwrap();

        name_only.assert_async().await;
        assert_eq!(result.title, "Eiffel Tower");
    }

    #[tokio::test]
    async fn test_lookup_falls_back_to_opensearch() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/rest_v1/page/summary/Colosseo")
            .with_status(404)
            .create_async()
            .await;
        server
            .mock("GET", "/w/api.php")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("action".into(), "opensearch".into()),
                Matcher::UrlEncoded("search".into(), "Colosseo".into()),
            ]))
            .with_status(200)
            .with_body(r#"["Colosseo", ["Colosseum"], [""], ["https://en.wikipedia.org/wiki/Colosseum"]]"#)
            .create_async()
            .await;
        server
            .mock("GET", "/api/rest_v1/page/summary/Colosseum")
            .with_status(200)
            .with_body(r#"{"title": "Colosseum", "extract": "The Colosseum is an amphitheatre in Rome."}"#)
            .create_async()
            .await;

        let request = WikipediaRequest {
            poi_name: "Colosseo".to_string(),
            location_context: None,
        };
        let result = service(&server.url()).lookup(&request).await.unwrap();

        assert_eq!(result.title, "Colosseum");
        assert_eq!(result.url, "https://en.wikipedia.org/wiki/Colosseum");
        assert_eq!(result.page_id, None);
        assert_eq!(result.summary, result.extract);
    }

    #[tokio::test]
    async fn test_lookup_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", Matcher::Regex("^/api/rest_v1/page/summary/".to_string()))
            .with_status(404)
            .create_async()
            .await;
        server
            .mock("GET", "/w/api.php")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"["Nowhere", [], [], []]"#)
            .create_async()
            .await;

        let request = WikipediaRequest {
            poi_name: "NonexistentPlace".to_string(),
            location_context: None,
        };
        let result = service(&server.url()).lookup(&request).await;
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_lookup_page_without_extract() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/rest_v1/page/summary/InvalidStructure")
            .with_status(200)
            .with_body(r#"{"unexpected_structure": "no extract field"}"#)
            .create_async()
            .await;

        let request = WikipediaRequest {
            poi_name: "InvalidStructure".to_string(),
            location_context: None,
        };
        let result = service(&server.url()).lookup(&request).await;
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }
}
