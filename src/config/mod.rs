//! Configuration management.
//!
//! Every section has defaults, most of them overridable from the process
//! environment, so the agent runs without any configuration file. A TOML
//! file and `TRAVEL_AGENT__<SECTION>__<KEY>` variables can be layered on
//! top with [`load_config`].
//!
//! ```toml
//! [servers]
//! geocoding = "http://127.0.0.1:8001"
//! poi = "http://127.0.0.1:8002"
//! wikipedia = "http://127.0.0.1:8003"
//! trivia = "http://127.0.0.1:8004"
//!
//! [agent]
//! timeout_secs = 10
//! enable_trivia = true
//!
//! [llm]
//! model = "gpt-4o-mini"
//!
//! [rate_limits]
//! wikipedia = 1.2
//!
//! [logging]
//! level = "info"
//! format = "json"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::services::ServiceKind;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Tool server endpoints used by the orchestrator
    #[serde(default)]
    pub servers: ServerUrls,

    /// Orchestrator settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Language model used by the query parser
    #[serde(default)]
    pub llm: LlmConfig,

    /// HTTP surface settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Public APIs wrapped by the tool servers
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Per-server rate limits
    #[serde(default)]
    pub rate_limits: RateLimitConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Base URLs of the four tool servers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerUrls {
    #[serde(default = "default_geocoding_url")]
    pub geocoding: String,

    #[serde(default = "default_poi_url")]
    pub poi: String,

    #[serde(default = "default_wikipedia_url")]
    pub wikipedia: String,

    #[serde(default = "default_trivia_url")]
    pub trivia: String,
}

impl ServerUrls {
    /// URL configured for a service
    pub fn url_for(&self, kind: ServiceKind) -> &str {
        match kind {
            ServiceKind::Geocoding => &self.geocoding,
            ServiceKind::Poi => &self.poi,
            ServiceKind::Wikipedia => &self.wikipedia,
            ServiceKind::Trivia => &self.trivia,
        }
    }
}

impl Default for ServerUrls {
    fn default() -> Self {
        Self {
            geocoding: default_geocoding_url(),
            poi: default_poi_url(),
            wikipedia: default_wikipedia_url(),
            trivia: default_trivia_url(),
        }
    }
}

fn server_url_from_env(kind: ServiceKind) -> String {
    std::env::var(kind.url_env_var())
        .unwrap_or_else(|_| format!("http://127.0.0.1:{}", kind.default_port()))
}

fn default_geocoding_url() -> String {
    server_url_from_env(ServiceKind::Geocoding)
}

fn default_poi_url() -> String {
    server_url_from_env(ServiceKind::Poi)
}

fn default_wikipedia_url() -> String {
    server_url_from_env(ServiceKind::Wikipedia)
}

fn default_trivia_url() -> String {
    server_url_from_env(ServiceKind::Trivia)
}

/// Orchestrator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Per-call timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Whether the trivia server takes part in the concurrent segment
    #[serde(default = "default_true")]
    pub enable_trivia: bool,
}

impl AgentConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            enable_trivia: true,
        }
    }
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

/// OpenAI-compatible chat completion settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// API key; the query parser falls back to the raw query without one
    #[serde(default = "default_llm_api_key")]
    pub api_key: Option<String>,

    #[serde(default = "default_llm_model")]
    pub model: String,

    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: default_llm_api_key(),
            model: default_llm_model(),
            base_url: default_llm_base_url(),
        }
    }
}

fn default_llm_api_key() -> Option<String> {
    std::env::var("OPENAI_API_KEY")
        .ok()
        .filter(|k| !k.trim().is_empty())
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_llm_base_url() -> String {
    std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com".to_string())
}

/// HTTP surface configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_host")]
    pub host: String,

    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
        }
    }
}

fn default_api_host() -> String {
    "127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
    8000
}

/// Public API endpoints wrapped by the tool servers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_nominatim_url")]
    pub nominatim_url: String,

    #[serde(default = "default_overpass_url")]
    pub overpass_url: String,

    #[serde(default = "default_wikipedia_api_url")]
    pub wikipedia_url: String,

    #[serde(default = "default_duckduckgo_url")]
    pub duckduckgo_url: String,

    /// Contact address sent in the User-Agent of upstream requests
    #[serde(default = "default_contact_email")]
    pub contact_email: String,

    /// Timeout for one upstream HTTP request in seconds
    #[serde(default = "default_upstream_timeout")]
    pub timeout_secs: u64,
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// User-Agent for upstream requests, e.g. `travel-agent/0.1.0 (contact@example.com)`
    pub fn user_agent(&self) -> String {
        format!(
            "{} ({})",
            crate::utils::default_user_agent(),
            self.contact_email
        )
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            nominatim_url: default_nominatim_url(),
            overpass_url: default_overpass_url(),
            wikipedia_url: default_wikipedia_api_url(),
            duckduckgo_url: default_duckduckgo_url(),
            contact_email: default_contact_email(),
            timeout_secs: default_upstream_timeout(),
        }
    }
}

fn default_nominatim_url() -> String {
    "https://nominatim.openstreetmap.org".to_string()
}

fn default_overpass_url() -> String {
    "https://overpass-api.de/api/interpreter".to_string()
}

fn default_wikipedia_api_url() -> String {
    "https://en.wikipedia.org".to_string()
}

fn default_duckduckgo_url() -> String {
    "https://api.duckduckgo.com/".to_string()
}

fn default_contact_email() -> String {
    std::env::var("MCP_CONTACT_EMAIL").unwrap_or_else(|_| "contact@example.com".to_string())
}

fn default_upstream_timeout() -> u64 {
    15
}

/// Requests per second allowed against each upstream API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_one_rps")]
    pub geocoding: f64,

    #[serde(default = "default_one_rps")]
    pub poi: f64,

    #[serde(default = "default_wikipedia_rps")]
    pub wikipedia: f64,

    #[serde(default = "default_one_rps")]
    pub trivia: f64,
}

impl RateLimitConfig {
    pub fn rate_for(&self, kind: ServiceKind) -> f64 {
        match kind {
            ServiceKind::Geocoding => self.geocoding,
            ServiceKind::Poi => self.poi,
            ServiceKind::Wikipedia => self.wikipedia,
            ServiceKind::Trivia => self.trivia,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            geocoding: default_one_rps(),
            poi: default_one_rps(),
            wikipedia: default_wikipedia_rps(),
            trivia: default_one_rps(),
        }
    }
}

fn default_one_rps() -> f64 {
    1.0
}

fn default_wikipedia_rps() -> f64 {
    1.2
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `json` for structured output, anything else for the pretty format
    #[serde(default)]
    pub format: Option<String>,
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format
            .as_deref()
            .is_some_and(|f| f.eq_ignore_ascii_case("json"))
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Load configuration from a file, with `TRAVEL_AGENT__*` environment overrides
pub fn load_config(path: &Path) -> Result<Config, config::ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::from(path))
        .add_source(config::Environment::with_prefix("TRAVEL_AGENT").separator("__"))
        .build()?;

    settings.try_deserialize()
}

/// Look for a configuration file in the usual places
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("travel-agent.toml");
    if local.is_file() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join("travel-agent").join("config.toml"))
        .filter(|path| path.is_file())
}

/// Get the default configuration (from env vars or defaults)
pub fn get_config() -> Config {
    Config::default()
}
