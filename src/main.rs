//! Switchboard - Main Entry Point
//!
//! Runs the request router as a line-oriented local service: one user
//! message per stdin line, one routing decision as JSON per stdout line.
//! Nothing leaves the machine; the only network peers are the local model
//! server endpoints named in the configuration.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use switchboard::config::RouterConfig;
use switchboard::corpus::ExampleCorpus;
use switchboard::embedding::OllamaEmbedder;
use switchboard::llm::providers::{OllamaConfig, OllamaProvider};
use switchboard::llm::LlmProvider;
use switchboard::observability::{init_default_logging, metrics};
use switchboard::request::RouteRequest;
use switchboard::router::RequestRouter;
use switchboard::trace::JsonlTraceSink;
use switchboard::version::VersionMarker;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{error, info, warn};

/// Privacy-first request router for a local conversational assistant
#[derive(Parser)]
#[command(name = "switchboard")]
#[command(about = "Request router for a local conversational assistant")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", env = "SWITCHBOARD_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Route messages from stdin, one JSON decision per stdout line
    Run,
    /// Create the state directory and seed the example corpus
    Init,
    /// Bump the system version, stranding all cached decisions
    BumpVersion,
    /// Validate configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize observability system
    init_default_logging();

    info!("Starting switchboard v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = match load_configuration(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {e}");
            process::exit(1);
        }
    };

    // Execute command
    let result = match cli.command {
        Commands::Run => run_router(config).await,
        Commands::Init => init_state(config).await,
        Commands::BumpVersion => bump_version(config),
        Commands::Config { show } => handle_config_command(config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {e}");
        process::exit(1);
    }
}

fn load_configuration(
    config_path: &Option<PathBuf>,
) -> Result<RouterConfig, Box<dyn std::error::Error>> {
    match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Ok(RouterConfig::load_from_file(path)?)
        }
        None => {
            // Try default locations
            let default_paths = vec!["switchboard.toml", "config/switchboard.toml"];

            for path_str in default_paths {
                let path = PathBuf::from(path_str);
                if path.exists() {
                    info!("Loading configuration from: {}", path.display());
                    return Ok(RouterConfig::load_from_file(&path)?);
                }
            }

            // Every field has a default, so no file means a local setup
            // with the stock patterns and thresholds
            info!("No configuration file found, using defaults");
            Ok(RouterConfig::default())
        }
    }
}

fn connect_provider(config: &RouterConfig) -> Result<Arc<OllamaProvider>, Box<dyn std::error::Error>> {
    Ok(Arc::new(OllamaProvider::new(OllamaConfig {
        base_url: config.classifier.endpoint.clone(),
        ..Default::default()
    })?))
}

/// Bootstrap factory - wires the concrete local providers into the router
fn build_router(
    config: &RouterConfig,
    provider: Arc<OllamaProvider>,
) -> Result<RequestRouter, Box<dyn std::error::Error>> {
    let embedder = OllamaEmbedder::new(&config.embedding)?;
    let trace_sink = JsonlTraceSink::create(config.trace_path())?;

    Ok(RequestRouter::new(
        config,
        provider,
        Arc::new(embedder),
        Arc::new(trace_sink),
    )?)
}

async fn run_router(config: RouterConfig) -> Result<(), Box<dyn std::error::Error>> {
    let provider = connect_provider(&config)?;
    if let Err(e) = provider.health_check().await {
        warn!(
            endpoint = %config.classifier.endpoint,
            "Ollama is not reachable ({e}); classification degrades to \
             semantic matching and the lexical fallback until it comes back"
        );
    }
    let router = build_router(&config, provider)?;

    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    info!("Router is running and reading messages from stdin...");

    loop {
        tokio::select! {
            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down gracefully...");
                break;
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down gracefully...");
                break;
            }
            line = lines.next_line() => {
                match line? {
                    Some(line) => {
                        let message = line.trim();
                        if message.is_empty() {
                            continue;
                        }

                        let request = RouteRequest::new(message);
                        let decision = router.classify(&request).await;

                        // The digest lets a caller correlate this line with
                        // the trace log and send feedback later
                        let output = serde_json::json!({
                            "request_digest": request.digest(),
                            "decision": decision,
                        });
                        println!("{output}");
                    }
                    None => {
                        info!("Input closed, shutting down");
                        break;
                    }
                }
            }
        }
    }

    let snapshot = metrics().get_metrics();
    info!(
        requests = snapshot.requests.received,
        cache_hits = snapshot.cache.hits,
        fallback_resolutions = snapshot.stages.fallback,
        "Router shutdown complete"
    );
    Ok(())
}

async fn init_state(config: RouterConfig) -> Result<(), Box<dyn std::error::Error>> {
    // The router refuses to start without a corpus file, so create it first
    ExampleCorpus::bootstrap(&config.corpus_path())?;

    let provider = connect_provider(&config)?;
    let router = build_router(&config, provider)?;

    let added = router.seed_corpus().await?;
    if added == 0 {
        info!("Corpus already populated, nothing to seed");
    } else {
        info!(added, "Seeded example corpus");
    }

    println!(
        "State directory ready at {} (version {}, {} seed examples added)",
        config.router.state_dir.display(),
        router.current_version(),
        added
    );
    Ok(())
}

fn bump_version(config: RouterConfig) -> Result<(), Box<dyn std::error::Error>> {
    let marker = VersionMarker::load_or_init(config.version_path())?;
    let version = marker.bump()?;
    println!("System version is now {version}");
    Ok(())
}

fn handle_config_command(
    config: RouterConfig,
    show: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if show {
        println!("Current configuration:");
        println!("{}", toml::to_string_pretty(&config)?);
    }

    info!("Configuration validation complete");
    Ok(())
}
