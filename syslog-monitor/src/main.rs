//! Syslog Health Monitor
//!
//! Reads kernel/driver log lines, detects GPU driver failures and writes the
//! resulting health events to stdout as JSON lines. Runs as a DaemonSet on GPU
//! nodes next to the log forwarder.

mod cli;
mod config;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, BufReader};
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::Cli;
use config::Config;
use syslog_monitor_core::handlers::GpuDriverErrorHandler;
use syslog_monitor_core::monitor::LineMonitor;

/// Initialize the tracing/logging subsystem
///
/// Logs go to stderr; stdout carries health events.
fn init_logging(log_level: &str, json_format: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Open the line source selected on the command line
async fn open_input(cli: &Cli) -> Result<Box<dyn AsyncBufRead + Unpin + Send>> {
    if cli.reads_stdin() {
        info!("Reading log lines from stdin");
        return Ok(Box::new(BufReader::new(tokio::io::stdin())));
    }

    let file = tokio::fs::File::open(&cli.input)
        .await
        .with_context(|| format!("Failed to open input {:?}", cli.input))?;
    info!(path = ?cli.input, "Reading log lines from file");
    Ok(Box::new(BufReader::new(file)))
}

/// Run the monitor until input is exhausted or shutdown is requested
async fn run(config: Config, cli: &Cli, shutdown_rx: watch::Receiver<bool>) -> Result<()> {
    let node_name = config
        .node_name
        .clone()
        .context("Node name must be specified via config, --node-name, or NODE_NAME env")?;

    info!(node = %node_name, "Starting syslog monitor on node");

    let gpu_driver = GpuDriverErrorHandler::new(
        node_name,
        config.agent_name.clone(),
        config.component_class.clone(),
        config.check_name.clone(),
    )
    .context("Failed to create GPU driver error handler")?;

    let monitor = LineMonitor::new().with_handler(Arc::new(gpu_driver));

    // Start metrics server if enabled
    if config.metrics.enabled {
        let port = config.metrics.port;
        tokio::spawn(async move {
            if let Err(e) = start_metrics_server(port).await {
                error!(error = %e, "Metrics server failed");
            }
        });
    }

    let input = open_input(cli).await?;
    let stats = monitor.run(input, tokio::io::stdout(), shutdown_rx).await?;

    info!(
        lines = stats.lines,
        events = stats.events,
        "Syslog monitor shutdown complete"
    );
    Ok(())
}

/// Start the Prometheus metrics HTTP server
async fn start_metrics_server(port: u16) -> Result<()> {
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!(port = port, "Metrics server listening");

    loop {
        let (mut socket, _) = listener.accept().await?;

        tokio::spawn(async move {
            let mut buf = [0; 1024];
            let _ = socket.read(&mut buf).await;

            let metrics_output = prometheus::TextEncoder::new()
                .encode_to_string(&prometheus::gather())
                .unwrap_or_default();

            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: text/plain; version=0.0.4; charset=utf-8\r\nContent-Length: {}\r\n\r\n{}",
                metrics_output.len(),
                metrics_output
            );

            let _ = socket.write_all(response.as_bytes()).await;
        });
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(&cli.log_level, cli.log_json);

    info!(version = env!("CARGO_PKG_VERSION"), "Syslog monitor starting");

    // Load configuration
    let mut config = if cli.config.exists() {
        Config::from_file(&cli.config)
            .with_context(|| format!("Failed to load config from {:?}", cli.config))?
    } else {
        warn!(path = ?cli.config, "Config file not found, using defaults");
        Config::default()
    };

    // Apply CLI overrides
    if cli.node_name.is_some() {
        config.node_name = cli.node_name.clone();
    }

    // Load node name from environment if not set
    config = config.with_node_name_from_env();

    // Validate configuration
    config.validate().context("Invalid configuration")?;

    info!(
        agent = %config.agent_name,
        check = %config.check_name,
        "Configuration loaded"
    );

    // Setup shutdown signal handler
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    error!(error = %e, "Failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received Ctrl+C, initiating shutdown");
            }
            _ = terminate => {
                info!("Received SIGTERM, initiating shutdown");
            }
        }

        let _ = shutdown_tx.send(true);
    });

    run(config, &cli, shutdown_rx).await
}
