//! cachegate — caching forward HTTP/HTTPS proxy
//!
//! Headless runner: parses flags, seeds the block list, starts the
//! server, drains proxy events into the log, and waits for shutdown
//! signals.

use anyhow::{Context, Result};
use clap::Parser;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cachegate::{ProxyConfig, ProxyServer};

/// Caching forward HTTP/HTTPS proxy
#[derive(Parser, Debug)]
#[command(name = "cachegate")]
#[command(author, version, about = "Caching forward HTTP/HTTPS proxy", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "CACHEGATE_CONFIG")]
    config: Option<String>,

    /// Listen address
    #[arg(short, long, env = "CACHEGATE_LISTEN")]
    listen: Option<String>,

    /// Listen port
    #[arg(short, long, env = "CACHEGATE_PORT")]
    port: Option<u16>,

    /// Block a target URL (repeatable)
    #[arg(short, long = "block", env = "CACHEGATE_BLOCK", value_delimiter = ',')]
    block: Vec<String>,

    /// Cap on concurrently handled connections (unbounded if omitted)
    #[arg(long, env = "CACHEGATE_MAX_CONNECTIONS")]
    max_connections: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "CACHEGATE_LOG_LEVEL")]
    log_level: String,

    /// Log file path (enables rolling file logging)
    #[arg(long, env = "CACHEGATE_LOG_FILE")]
    log_file: Option<String>,

    /// Enable JSON structured logging
    #[arg(long, env = "CACHEGATE_LOG_JSON")]
    log_json: bool,

    /// Generate default configuration and exit
    #[arg(long)]
    generate_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.generate_config {
        return generate_default_config();
    }

    init_logging(&cli)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting cachegate");

    let config = load_config(&cli)?;

    let event_tx = cachegate::log_drain();
    let server = ProxyServer::new(config, event_tx);

    for url in &cli.block {
        server.add_blocked(url);
        tracing::info!("Blocked URL: {}", url);
    }

    let addr = server.start().await?;
    tracing::info!("Proxying on {}", addr);

    wait_for_shutdown().await;

    server.stop().await?;
    tracing::info!("cachegate shutting down gracefully");

    Ok(())
}

/// Initialize the logging system.
fn init_logging(cli: &Cli) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    if let Some(log_path) = &cli.log_file {
        let path = std::path::Path::new(log_path);
        let dir = path.parent().unwrap_or(std::path::Path::new("."));
        let filename = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("cachegate.log");
        let file_appender = RollingFileAppender::new(Rotation::DAILY, dir, filename);

        if cli.log_json {
            subscriber
                .with(fmt::layer().json().with_writer(file_appender).with_ansi(false))
                .init();
        } else {
            subscriber
                .with(fmt::layer().with_writer(file_appender).with_ansi(false))
                .init();
        }
    } else if cli.log_json {
        subscriber.with(fmt::layer().json()).init();
    } else {
        subscriber.with(fmt::layer()).init();
    }

    Ok(())
}

/// Load configuration with CLI overrides.
fn load_config(cli: &Cli) -> Result<ProxyConfig> {
    let mut config = ProxyConfig::load(cli.config.as_deref())?;

    if let Some(listen) = &cli.listen {
        config.listen_addr = listen.clone();
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if cli.max_connections.is_some() {
        config.max_connections = cli.max_connections;
    }

    validate_config(&config)?;

    Ok(config)
}

/// Validate configuration.
fn validate_config(config: &ProxyConfig) -> Result<()> {
    if config.port == 0 {
        anyhow::bail!("Listen port cannot be 0");
    }

    if config.backlog == 0 {
        anyhow::bail!("Accept backlog must be greater than 0");
    }

    if config.max_connections == Some(0) {
        anyhow::bail!("max_connections must be greater than 0 when set");
    }

    Ok(())
}

/// Generate default configuration file contents.
fn generate_default_config() -> Result<()> {
    let config = ProxyConfig::default();
    let toml = toml::to_string_pretty(&config).context("Failed to serialize configuration")?;

    println!("{}", toml);
    Ok(())
}

/// Block until a shutdown signal arrives.
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint =
            signal(SignalKind::interrupt()).expect("Failed to register SIGINT handler");
        let mut sigterm =
            signal(SignalKind::terminate()).expect("Failed to register SIGTERM handler");

        tokio::select! {
            _ = sigint.recv() => {
                tracing::info!("Received SIGINT, initiating shutdown");
            }
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM, initiating shutdown");
            }
        }
    }

    #[cfg(windows)]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to register Ctrl+C handler");
        tracing::info!("Received Ctrl+C, initiating shutdown");
    }
}
