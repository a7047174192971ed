use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use executor_config::ConfigLoader;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod service;

#[derive(Parser)]
#[command(name = "dex-executor")]
#[command(about = "DEX Order Execution Engine", long_about = None)]
struct Cli {
	#[command(subcommand)]
	command: Option<Commands>,

	#[arg(short, long, value_name = "FILE", default_value = "config/local.toml")]
	config: PathBuf,

	#[arg(long, env = "EXECUTOR_LOG_LEVEL", default_value = "info")]
	log_level: String,
}

#[derive(Subcommand)]
enum Commands {
	/// Start the execution engine
	Start,
	/// Validate the configuration file
	Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();

	// Initialize tracing
	setup_tracing(&cli.log_level)?;

	// Handle commands
	match cli.command {
		Some(Commands::Start) | None => start_service(cli).await,
		Some(Commands::Validate) => validate_config(cli).await,
	}
}

async fn start_service(cli: Cli) -> Result<()> {
	info!("Starting DEX Order Execution Engine");
	info!("Loading configuration from: {:?}", cli.config);

	// Load configuration
	let config = ConfigLoader::new()
		.with_file(&cli.config)
		.load()
		.await
		.context("Failed to load configuration")?;

	info!("Configuration loaded successfully");
	info!("Engine name: {}", config.engine.name);
	info!("HTTP port: {}", config.engine.http_port);

	let http_port = config.engine.http_port;

	// Compose the engine with the configured router backend
	let engine = Arc::new(service::build_engine(config)?);

	// Start the dispatch loop
	let dispatcher = engine.clone();
	let dispatch_handle = tokio::spawn(async move { dispatcher.run().await });

	// Start HTTP/WebSocket server
	let state = api::AppState {
		sink: engine.sink(),
		engine: engine.clone(),
	};
	let http_handle = tokio::spawn(async move { api::start_http_server(state, http_port).await });

	// Setup graceful shutdown
	let shutdown_signal = setup_shutdown_signal();

	info!("DEX Order Execution Engine started successfully");

	// Wait for shutdown signal
	shutdown_signal.await;

	info!("Shutdown signal received, stopping services...");

	// Stop dispatching and drain in-flight orders
	engine.shutdown();
	dispatch_handle
		.await
		.context("Dispatch loop panicked")?
		.context("Dispatch loop failed")?;

	// Cancel the server task
	http_handle.abort();

	info!("DEX Order Execution Engine stopped");
	Ok(())
}

async fn validate_config(cli: Cli) -> Result<()> {
	info!("Validating configuration file: {:?}", cli.config);

	// Try to load the configuration
	let config = ConfigLoader::new()
		.with_file(&cli.config)
		.load()
		.await
		.context("Failed to load configuration")?;

	info!("Configuration is valid");
	info!("Engine name: {}", config.engine.name);
	info!("Router backend: {:?}", config.router.kind);
	info!(
		"Admission: {} concurrent, {} starts per {} ms",
		config.admission.max_concurrency, config.admission.rate_limit, config.admission.rate_window_ms
	);
	info!(
		"Retry: {} attempts, {} ms base backoff",
		config.retry.max_attempts, config.retry.base_delay_ms
	);

	Ok(())
}

fn setup_tracing(log_level: &str) -> Result<()> {
	let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

	tracing_subscriber::registry()
		.with(env_filter)
		.with(tracing_subscriber::fmt::layer())
		.init();

	Ok(())
}

async fn setup_shutdown_signal() {
	let ctrl_c = async {
		signal::ctrl_c()
			.await
			.expect("failed to install Ctrl+C handler");
	};

	#[cfg(unix)]
	let terminate = async {
		signal::unix::signal(signal::unix::SignalKind::terminate())
			.expect("failed to install signal handler")
			.recv()
			.await;
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}
}
