use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::task::JoinHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use travel_agent::agent::{McpClient, Orchestrator, ToolCaller};
use travel_agent::config::{find_config_file, get_config, load_config, Config};
use travel_agent::mcp::McpServer;
use travel_agent::models::{AgentResponse, ToolResult};
use travel_agent::services::{build_service, ServiceKind, ServiceRegistry};

/// Travel Agent - answer travel questions by combining geocoding, POI, Wikipedia and trivia tool servers
#[derive(Parser, Debug)]
#[command(name = "travel-agent")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Answer natural-language travel queries through MCP tool servers", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (can be used multiple times for more verbosity: -v, -vv)
    #[arg(long, short, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short)]
    quiet: bool,

    /// Output format
    #[arg(long, short, value_enum, global = true, default_value_t = OutputFormat::Json)]
    output: OutputFormat,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Per-call timeout in seconds (overrides the configuration)
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Show all environment variables
    #[arg(long, global = true)]
    env: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Output format for results
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Pretty-printed JSON
    Json,
    /// Table format (human-readable)
    Table,
}

/// Tool servers
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Service {
    Geocoding,
    Poi,
    Wikipedia,
    Trivia,
}

impl From<Service> for ServiceKind {
    fn from(service: Service) -> Self {
        match service {
            Service::Geocoding => ServiceKind::Geocoding,
            Service::Poi => ServiceKind::Poi,
            Service::Wikipedia => ServiceKind::Wikipedia,
            Service::Trivia => ServiceKind::Trivia,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Answer a query, or start an interactive prompt when no query is given
    #[command(alias = "q")]
    Query {
        /// Natural language travel request
        query: Option<String>,
    },

    /// Run the HTTP API
    Api {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Run one tool server
    Serve {
        /// Service to host
        #[arg(value_enum)]
        service: Service,

        /// Use stdio transport instead of HTTP
        #[arg(long)]
        stdio: bool,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on (defaults to the service's port)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Run all four tool servers on their default ports
    ServeAll {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },

    /// Check that tool servers complete the MCP handshake
    Health {
        /// Service to check (default: all)
        #[arg(value_enum)]
        service: Option<Service>,
    },

    /// Print the effective configuration as TOML
    Config,
}

/// Print all available environment variables
fn print_env_vars() {
    println!("Travel Agent - Environment Variables");
    println!();
    println!("Tool Servers:");
    for kind in ServiceKind::ALL {
        println!(
            "  {:<24}{} URL (default: http://127.0.0.1:{})",
            kind.url_env_var(),
            kind.server_name(),
            kind.default_port()
        );
    }
    println!();
    println!("Query Parsing:");
    println!("  OPENAI_API_KEY          API key for the query parser (fallback parsing without it)");
    println!("  OPENAI_BASE_URL         OpenAI-compatible endpoint (default: https://api.openai.com)");
    println!();
    println!("Upstream APIs:");
    println!("  MCP_CONTACT_EMAIL       Contact address sent in the User-Agent");
    println!();
    println!("Configuration Overrides:");
    println!("  TRAVEL_AGENT__AGENT__TIMEOUT_SECS         Per-call timeout (default: 10)");
    println!("  TRAVEL_AGENT__AGENT__ENABLE_TRIVIA        Include trivia in queries (default: true)");
    println!("  TRAVEL_AGENT__RATE_LIMITS__WIKIPEDIA      Wikipedia requests per second (default: 1.2)");
    println!("  TRAVEL_AGENT__LOGGING__FORMAT             'json' for structured logs");
    println!();
    println!("Other Settings:");
    println!("  RUST_LOG                Rust logging level (e.g., debug, info, warn, error)");
    println!();
    println!("Example:");
    println!("  export OPENAI_API_KEY=\"your-key-here\"");
    println!("  export GEOCODING_SERVER_URL=\"http://geo.internal:8001\"");
    std::process::exit(0);
}

fn init_tracing(cli: &Cli, config: &Config) {
    let level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => config.logging.level.as_str(),
        (false, 1) => "debug",
        (false, _) => "trace",
    };

    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| format!("travel_agent={}", level)),
    );

    // Logs go to stderr so stdout stays free for results and the stdio transport
    let json = config.logging.is_json();
    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
        }))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.env {
        print_env_vars();
    }

    let config_path = cli.config.clone().or_else(find_config_file);
    let mut config = match &config_path {
        Some(path) => load_config(path)?,
        None => get_config(),
    };
    if let Some(timeout) = cli.timeout {
        config.agent.timeout_secs = timeout;
    }

    init_tracing(&cli, &config);
    if let Some(path) = &config_path {
        tracing::info!("Using config file: {}", path.display());
    }

    match cli.command {
        Some(Commands::Query { query: Some(query) }) => {
            let orchestrator = Orchestrator::from_config(&config)?;
            let response = orchestrator.handle_query(&query).await?;
            output_response(&response, cli.output)?;
        }

        Some(Commands::Query { query: None }) | None => {
            let orchestrator = Orchestrator::from_config(&config)?;
            repl(&orchestrator, cli.output).await?;
        }

        Some(Commands::Api { host, port }) => {
            let host = host.unwrap_or_else(|| config.api.host.clone());
            let port = port.unwrap_or(config.api.port);
            let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

            let orchestrator = Arc::new(Orchestrator::from_config(&config)?);
            travel_agent::api::serve(orchestrator, addr).await?;
        }

        Some(Commands::Serve {
            service,
            stdio,
            host,
            port,
        }) => {
            let kind = ServiceKind::from(service);
            let server = McpServer::new(build_service(kind, &config)?)?;

            if stdio {
                server.run().await?;
            } else {
                let addr = format!("{}:{}", host, port.unwrap_or(kind.default_port()));
                let (bound_addr, handle) = server.run_http(&addr).await?;
                tracing::info!("{} listening on {}", kind.server_name(), bound_addr);
                wait_for_servers(vec![handle]).await?;
            }
        }

        Some(Commands::ServeAll { host }) => {
            let registry = ServiceRegistry::from_config(&config)?;
            let mut handles = Vec::new();

            for service in registry.all() {
                let kind = service.kind();
                let server = McpServer::new(service.clone())?;
                let addr = format!("{}:{}", host, kind.default_port());
                let (bound_addr, handle) = server.run_http(&addr).await?;
                tracing::info!("{} listening on {}", kind.server_name(), bound_addr);
                handles.push(handle);
            }

            wait_for_servers(handles).await?;
        }

        Some(Commands::Health { service }) => {
            let kinds: Vec<ServiceKind> = match service {
                Some(service) => vec![service.into()],
                None => ServiceKind::ALL.to_vec(),
            };
            check_health(&config, &kinds, cli.output).await?;
        }

        Some(Commands::Config) => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

/// Interactive prompt; `quit` or `exit` ends it
async fn repl(orchestrator: &Orchestrator, format: OutputFormat) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Travel Agent REPL. Type 'quit' to exit.");
    loop {
        stdout.write_all(b">> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let query = line.trim();
        if query.eq_ignore_ascii_case("quit") || query.eq_ignore_ascii_case("exit") {
            break;
        }
        if query.is_empty() {
            continue;
        }

        match orchestrator.handle_query(query).await {
            Ok(response) => output_response(&response, format)?,
            Err(e) => eprintln!("Error: {}", e),
        }
    }

    Ok(())
}

/// Block until Ctrl+C or until any server task ends
async fn wait_for_servers(handles: Vec<JoinHandle<()>>) -> Result<()> {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
        }
        (result, index, _) = futures_util::future::select_all(handles) => {
            result.map_err(|e| anyhow::anyhow!("Server task {} failed: {}", index, e))?;
        }
    }
    Ok(())
}

async fn check_health(config: &Config, kinds: &[ServiceKind], format: OutputFormat) -> Result<()> {
    let mut rows = Vec::new();
    for &kind in kinds {
        let url = config.servers.url_for(kind);
        let client = McpClient::for_service(kind, url, config.agent.timeout())?;
        let healthy = client.health().await;
        rows.push((kind, url.to_string(), healthy));
    }

    match format {
        OutputFormat::Json => {
            let report: Vec<_> = rows
                .iter()
                .map(|(kind, url, healthy)| {
                    serde_json::json!({
                        "service": kind.id(),
                        "url": url,
                        "status": if *healthy { "ok" } else { "unhealthy" },
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Table => {
            use comfy_table::{Cell, Color, Table};
            let mut table = Table::new();
            table.load_preset(comfy_table::presets::UTF8_FULL);
            table.set_header(vec!["Service", "Tool", "URL", "Status"]);

            for (kind, url, healthy) in &rows {
                let status = if *healthy {
                    Cell::new("ok").fg(Color::Green)
                } else {
                    Cell::new("unhealthy").fg(Color::Red)
                };
                table.add_row(vec![
                    Cell::new(kind.id()),
                    Cell::new(kind.tool_name()),
                    Cell::new(url),
                    status,
                ]);
            }
            println!("{table}");
        }
    }

    let unhealthy = rows.iter().filter(|(_, _, healthy)| !healthy).count();
    if unhealthy > 0 {
        anyhow::bail!("{} tool server(s) unhealthy", unhealthy);
    }
    Ok(())
}

fn output_response(response: &AgentResponse, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(response)?);
        }
        OutputFormat::Table => {
            use comfy_table::{Attribute, Cell, Table};
            let mut table = Table::new();
            table.load_preset(comfy_table::presets::UTF8_FULL);
            table.set_header(vec!["Source", "Result"]);

            for result in &response.results {
                table.add_row(vec![
                    Cell::new(&result.source).add_attribute(Attribute::Bold),
                    Cell::new(describe(result)),
                ]);
            }
            println!("{table}");
        }
    }
    Ok(())
}

/// One-line description of a tool result for table output
fn describe(result: &ToolResult) -> String {
    let data = &result.data;
    let text = match result.source.as_str() {
        "geocoding" => format!(
            "{} ({}, {})",
            data["display_name"].as_str().unwrap_or("?"),
            data["lat"],
            data["lon"]
        ),
        "poi" => {
            let pois = data.as_array().map(Vec::as_slice).unwrap_or_default();
            let names: Vec<&str> = pois
                .iter()
                .filter_map(|p| p["name"].as_str())
                .take(5)
                .collect();
            format!("{} places: {}", pois.len(), names.join(", "))
        }
        "wikipedia" => format!(
            "{}: {}",
            data["title"].as_str().unwrap_or("?"),
            data["summary"].as_str().unwrap_or_default()
        ),
        "trivia" => format!(
            "{} ({})",
            data["trivia"].as_str().unwrap_or_default(),
            data["source"].as_str().unwrap_or("?")
        ),
        _ => data.to_string(),
    };
    truncate(&text, 120)
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars.saturating_sub(3)) {
        Some((idx, _)) if text.chars().count() > max_chars => format!("{}...", &text[..idx]),
        _ => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default_values() {
        let cli = Cli::parse_from(["travel-agent"]);
        assert_eq!(cli.verbose, 0);
        assert!(!cli.quiet);
        assert_eq!(cli.output, OutputFormat::Json);
        assert!(cli.timeout.is_none());
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_verbose_flag() {
        let cli = Cli::parse_from(["travel-agent", "-vv"]);
        assert_eq!(cli.verbose, 2);

        let cli = Cli::parse_from(["travel-agent", "--quiet"]);
        assert!(cli.quiet);
    }

    #[test]
    fn test_cli_query_command() {
        let cli = Cli::parse_from(["travel-agent", "query", "museums in Rome", "-o", "table"]);
        match &cli.command {
            Some(Commands::Query { query }) => {
                assert_eq!(query.as_deref(), Some("museums in Rome"));
            }
            _ => panic!("Expected Query command"),
        }
        assert_eq!(cli.output, OutputFormat::Table);

        let cli = Cli::parse_from(["travel-agent", "q"]);
        assert!(matches!(cli.command, Some(Commands::Query { query: None })));
    }

    #[test]
    fn test_cli_serve_command() {
        let cli = Cli::parse_from(["travel-agent", "serve", "wikipedia"]);
        match &cli.command {
            Some(Commands::Serve {
                service,
                stdio,
                host,
                port,
            }) => {
                assert_eq!(*service, Service::Wikipedia);
                assert!(!*stdio);
                assert_eq!(host, "127.0.0.1");
                assert!(port.is_none());
            }
            _ => panic!("Expected Serve command"),
        }

        let cli = Cli::parse_from(["travel-agent", "serve", "poi", "--stdio"]);
        assert!(matches!(
            cli.command,
            Some(Commands::Serve { stdio: true, service: Service::Poi, .. })
        ));
    }

    #[test]
    fn test_cli_global_options() {
        let cli = Cli::parse_from(["travel-agent", "health", "--timeout", "3", "trivia"]);
        assert_eq!(cli.timeout, Some(3));
        assert!(matches!(
            cli.command,
            Some(Commands::Health { service: Some(Service::Trivia) })
        ));
    }

    #[test]
    fn test_service_conversion() {
        assert_eq!(ServiceKind::from(Service::Geocoding), ServiceKind::Geocoding);
        assert_eq!(ServiceKind::from(Service::Trivia).default_port(), 8004);
    }

    #[test]
    fn test_describe_results() {
        let geocode = ToolResult::new(
            "geocoding",
            serde_json::json!({"lat": 1.0, "lon": 2.0, "display_name": "Rome"}),
        );
        assert_eq!(describe(&geocode), "Rome (1.0, 2.0)");

        let pois = ToolResult::new("poi", serde_json::json!([{"name": "A"}, {"name": "B"}]));
        assert_eq!(describe(&pois), "2 places: A, B");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghijkl", 10), "abcdefg...");
    }
}
