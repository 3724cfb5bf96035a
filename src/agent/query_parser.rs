//! Natural language query parsing.
//!
//! [`LlmQueryParser`] asks an OpenAI-compatible chat completion endpoint to
//! extract a location and a POI category. Parsing never fails: any error
//! degrades to [`ParsedQuery::fallback`].

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::LlmConfig;
use crate::models::{Category, ParsedQuery};

/// Turns free text into structured query parameters
#[async_trait]
pub trait QueryParser: Send + Sync + std::fmt::Debug {
    async fn parse(&self, query: &str) -> ParsedQuery;
}

/// Uses the raw query as the location and `tourism` as the category
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackQueryParser;

#[async_trait]
impl QueryParser for FallbackQueryParser {
    async fn parse(&self, query: &str) -> ParsedQuery {
        ParsedQuery::fallback(query)
    }
}

/// Query parser backed by an OpenAI-compatible chat completions API
#[derive(Debug)]
pub struct LlmQueryParser {
    api_key: String,
    model: String,
    base_url: String,
    http: reqwest::Client,
}

impl LlmQueryParser {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    fn system_prompt() -> String {
        let categories: Vec<&str> = Category::ALL.iter().map(|c| c.as_str()).collect();
        format!(
            "You are a parser that extracts travel parameters. \
             Return a JSON object with keys 'location' and 'category'. \
             The category must be one of {:?}.",
            categories
        )
    }

    async fn complete(&self, query: &str) -> Result<String, String> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "temperature": 0,
            "messages": [
                {"role": "system", "content": Self::system_prompt()},
                {"role": "user", "content": query}
            ]
        });

        let resp = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = resp.status();
        let resp_body: Value = resp.json().await.map_err(|e| e.to_string())?;

        if !status.is_success() {
            return Err(format!("OpenAI API error {}: {}", status, resp_body));
        }

        resp_body["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| "No content in completion".to_string())
    }
}

#[async_trait]
impl QueryParser for LlmQueryParser {
    async fn parse(&self, query: &str) -> ParsedQuery {
        match self.complete(query).await {
            Ok(content) => parse_completion(&content, query),
            Err(e) => {
                warn!(error = %e, "Query parsing failed, using fallback");
                ParsedQuery::fallback(query)
            }
        }
    }
}

/// Interpret the model's reply.
///
/// Blank or missing locations fall back to the raw query and unknown
/// categories to `tourism`; unparseable replies yield the full fallback.
pub fn parse_completion(content: &str, query: &str) -> ParsedQuery {
    let json = strip_code_fence(content);

    let data: Value = match serde_json::from_str(json) {
        Ok(Value::Object(map)) => Value::Object(map),
        _ => {
            debug!(content, "Completion is not a JSON object");
            return ParsedQuery::fallback(query);
        }
    };

    let location = match &data["location"] {
        Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
        Value::Null => query.to_string(),
        other if !other.is_string() => other.to_string(),
        _ => query.to_string(),
    };

    let category = data["category"]
        .as_str()
        .and_then(|c| c.parse::<Category>().ok())
        .unwrap_or_default();

    ParsedQuery { location, category }
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop an optional language tag on the opening fence
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    rest.trim_end().trim_end_matches("```").trim()
}

/// Build the configured parser: the LLM parser when an API key is set,
/// otherwise the fallback parser
pub fn from_config(config: &LlmConfig, timeout: Duration) -> std::sync::Arc<dyn QueryParser> {
    let Some(api_key) = config.api_key.as_deref() else {
        debug!("No LLM API key configured, using fallback query parser");
        return std::sync::Arc::new(FallbackQueryParser);
    };

    match LlmQueryParser::new(api_key, &config.model, &config.base_url, timeout) {
        Ok(parser) => std::sync::Arc::new(parser),
        Err(e) => {
            warn!(error = %e, "Failed to build LLM client, using fallback query parser");
            std::sync::Arc::new(FallbackQueryParser)
        }
    }
}
