//! Travel trivia service backed by the DuckDuckGo Instant Answer API.
//!
//! Candidate facts are filtered in two stages. The strict stage requires a
//! context word (when a context is given) plus a travel keyword or topic
//! word; the relaxed stage only requires a topic word, preferring candidates
//! that also mention the context. The chosen fact is dropped when its source
//! scores below [`RELIABILITY_THRESHOLD`].

use async_trait::async_trait;
use serde_json::Value;

use crate::config::UpstreamConfig;
use crate::models::{TriviaRequest, TriviaResponse};
use crate::services::{decode_request, ServiceError, ServiceKind, ToolService};
use crate::utils::{HttpClient, RateLimiter};

/// Minimum source reliability for a fact to be returned
pub const RELIABILITY_THRESHOLD: f64 = 0.6;

const DEFAULT_RELIABILITY: f64 = 0.5;

const SOURCE_RELIABILITY: &[(&str, f64)] = &[
    ("wikipedia", 0.9),
    ("britannica", 0.8),
    ("duckduckgo", 0.6),
];

const TRAVEL_KEYWORDS: &[&str] = &[
    "travel",
    "tourist",
    "tourism",
    "visit",
    "destination",
    "city",
    "country",
    "landmark",
    "museum",
    "beach",
    "mountain",
    "attraction",
    "monument",
    "historic",
    "culture",
    "architecture",
    "famous",
    "popular",
    "location",
    "site",
    "built",
    "constructed",
];

/// A fact candidate with its provenance
#[derive(Debug, Clone, PartialEq)]
pub struct TriviaCandidate {
    pub text: String,
    pub source: String,
    pub url: Option<String>,
}

impl TriviaCandidate {
    pub fn new(text: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: source.into(),
            url: None,
        }
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.url = (!url.is_empty()).then_some(url);
        self
    }

    /// Collect candidates from an Instant Answer payload: the abstract first,
    /// then related topics and their nested topic groups
    pub fn from_instant_answer(data: &Value) -> Vec<Self> {
        let mut candidates = Vec::new();

        if let Some(text) = data
            .get("AbstractText")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
        {
            let source = data
                .get("AbstractSource")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .unwrap_or("DuckDuckGo");
            let url = data.get("AbstractURL").and_then(Value::as_str).unwrap_or("");
            candidates.push(Self::new(text, source).url(url));
        }

        let related = data
            .get("RelatedTopics")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        for item in related {
            if let Some(candidate) = Self::from_topic(item) {
                candidates.push(candidate);
            } else if let Some(topics) = item.get("Topics").and_then(Value::as_array) {
                candidates.extend(topics.iter().filter_map(Self::from_topic));
            }
        }

        candidates
    }

    fn from_topic(topic: &Value) -> Option<Self> {
        let text = topic.get("Text")?.as_str()?;
        let url = topic.get("FirstURL").and_then(Value::as_str).unwrap_or("");
        Some(Self::new(text, "DuckDuckGo").url(url))
    }
}

/// Finds travel-relevant trivia for a topic
#[derive(Debug)]
pub struct TriviaService {
    client: HttpClient,
    base_url: String,
    rate_limiter: RateLimiter,
}

impl TriviaService {
    pub fn new(upstream: &UpstreamConfig, requests_per_second: f64) -> Result<Self, ServiceError> {
        let client = HttpClient::with_user_agent(&upstream.user_agent(), upstream.timeout())?;
        Ok(Self {
            client,
            base_url: upstream.duckduckgo_url.clone(),
            rate_limiter: RateLimiter::per_second(requests_per_second),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_rate_limiter(mut self, rate_limiter: RateLimiter) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    /// Fetch one reliable, travel-relevant fact
    pub async fn trivia(&self, request: &TriviaRequest) -> Result<TriviaResponse, ServiceError> {
        let data = self.fetch(request).await?;
        let candidates = TriviaCandidate::from_instant_answer(&data);

        let fact = extract_fact(&candidates, request)
            .ok_or_else(|| ServiceError::NotFound("No travel-relevant trivia found".to_string()))?;

        let reliability = score_source(&fact.source);
        if reliability < RELIABILITY_THRESHOLD {
            tracing::warn!(source = %fact.source, reliability, "Dropping low reliability trivia");
            return Err(ServiceError::LowReliability {
                origin: fact.source.clone(),
                score: reliability,
            });
        }

        Ok(TriviaResponse {
            trivia: fact.text.clone(),
            source: fact.source.clone(),
            url: fact.url.clone(),
            reliability,
        })
    }

    async fn fetch(&self, request: &TriviaRequest) -> Result<Value, ServiceError> {
        let query = format!(
            "{} {}",
            request.topic,
            request.context.as_deref().unwrap_or("")
        )
        .trim()
        .to_string();

        self.rate_limiter.wait().await;

        let response = self
            .client
            .client()
            .get(&self.base_url)
            .header("Accept", "application/json")
            .query(&[
                ("q", query.as_str()),
                ("format", "json"),
                ("no_html", "1"),
                ("no_redirect", "1"),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    tracing::error!(query = %query, "DuckDuckGo request timed out");
                    ServiceError::Timeout("DuckDuckGo".to_string())
                } else {
                    tracing::error!(query = %query, error = %e, "DuckDuckGo API error");
                    ServiceError::Network(format!("DuckDuckGo API error: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(query = %query, status = status.as_u16(), "DuckDuckGo API error");
            return Err(ServiceError::Http(status.as_u16()));
        }

        // DuckDuckGo labels its JSON as application/x-javascript
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(query = %query, error = %e, "Invalid DuckDuckGo response");
            ServiceError::Parse("Invalid response from DuckDuckGo API".to_string())
        })
    }
}

#[async_trait]
impl ToolService for TriviaService {
    fn kind(&self) -> ServiceKind {
        ServiceKind::Trivia
    }

    fn description(&self) -> &str {
        "Fetch a travel-related trivia fact from the DuckDuckGo Instant Answer API"
    }

    fn request_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "topic": {
                    "type": "string",
                    "description": "Topic to search trivia for"
                },
                "context": {
                    "type": "string",
                    "description": "Optional travel context such as a city or country"
                }
            },
            "required": ["topic"]
        })
    }

    async fn invoke(&self, request: Value) -> Result<Value, ServiceError> {
        let request: TriviaRequest = decode_request(request)?;
        let response = self.trivia(&request).await?;
        Ok(serde_json::to_value(response)?)
    }
}

/// Reliability of a source name; unlisted sources score 0.5
pub fn score_source(source: &str) -> f64 {
    let source = source.to_lowercase();
    SOURCE_RELIABILITY
        .iter()
        .find(|(name, _)| *name == source)
        .map(|(_, score)| *score)
        .unwrap_or(DEFAULT_RELIABILITY)
}

fn words(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

/// Lowercased context words; a blank context counts as no context
fn context_words(request: &TriviaRequest) -> Option<Vec<String>> {
    request
        .context
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(words)
}

fn contains_any<I, S>(haystack: &str, needles: I) -> bool
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    needles.into_iter().any(|n| haystack.contains(n.as_ref()))
}

/// Whether a fact mentions the context (if any) and is travel relevant
pub fn matches_context(text: &str, request: &TriviaRequest) -> bool {
    let text = text.to_lowercase();

    if let Some(context) = context_words(request) {
        if !contains_any(&text, &context) {
            return false;
        }
    }

    contains_any(&text, TRAVEL_KEYWORDS) || contains_any(&text, &words(&request.topic))
}

/// First candidate passing [`matches_context`]
pub fn extract_fact_strict<'a>(
    candidates: &'a [TriviaCandidate],
    request: &TriviaRequest,
) -> Option<&'a TriviaCandidate> {
    candidates.iter().find(|c| matches_context(&c.text, request))
}

/// First candidate mentioning a topic word, preferring one that also
/// mentions a context word
pub fn extract_fact_relaxed<'a>(
    candidates: &'a [TriviaCandidate],
    request: &TriviaRequest,
) -> Option<&'a TriviaCandidate> {
    let topic_words = words(&request.topic);
    let context_words = context_words(request);

    let mentions_topic: Vec<&TriviaCandidate> = candidates
        .iter()
        .filter(|c| contains_any(&c.text.to_lowercase(), &topic_words))
        .collect();

    let preferred = mentions_topic.iter().find(|c| match &context_words {
        Some(context) => contains_any(&c.text.to_lowercase(), context),
        None => true,
    });

    preferred.or_else(|| mentions_topic.first()).copied()
}

/// Strict filtering, falling back to relaxed filtering
pub fn extract_fact<'a>(
    candidates: &'a [TriviaCandidate],
    request: &TriviaRequest,
) -> Option<&'a TriviaCandidate> {
    extract_fact_strict(candidates, request).or_else(|| extract_fact_relaxed(candidates, request))
}
