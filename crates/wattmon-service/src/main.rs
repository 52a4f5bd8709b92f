//! Wattmon Service - disaggregation scheduler and HTTP API.
//!
//! Run with: `cargo run -p wattmon-service`

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use clap::{Parser, Subcommand};
use time::OffsetDateTime;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use wattmon_nilm::{CommandRunner, Disaggregator};
use wattmon_service::{AppState, Config, Scheduler, api, process_device};
use wattmon_store::CouchStore;
use wattmon_types::parse_day;

/// Wattmon Service - disaggregation scheduler and HTTP REST API.
#[derive(Parser, Debug)]
#[command(name = "wattmon-service")]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Bind address (overrides config).
    #[arg(short, long, global = true)]
    bind: Option<String>,

    /// Disable the background scheduler (API only mode).
    #[arg(long, global = true)]
    no_scheduler: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the service in the foreground (default behavior).
    Run,

    /// Run the disaggregation pipeline for explicit dates, then exit.
    Disaggregate {
        /// Device identifier to process.
        #[arg(short, long)]
        device: String,

        /// Dates to process (YYYY-MM-DD, `today` or `yesterday`).
        #[arg(required = true)]
        dates: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("wattmon_service=info".parse()?)
                .add_directive("wattmon_nilm=info".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    // Load configuration
    let mut config = match &args.config {
        Some(path) => Config::load_validated(path)?,
        None => Config::load_default()?,
    };

    // Override config with CLI args
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }

    match args.command {
        Some(Command::Disaggregate { device, dates }) => {
            run_disaggregation(config, &device, &dates).await
        }
        Some(Command::Run) | None => run_server(config, args.no_scheduler).await,
    }
}

async fn run_server(config: Config, no_scheduler: bool) -> anyhow::Result<()> {
    let offset = config.pipeline.offset()?;

    info!("Connecting to document store at {}", config.store.url);
    let store = Arc::new(CouchStore::new(
        &config.store.url,
        &config.store.username,
        &config.store.password,
    )?);

    // Parse bind address before handing the config over
    let addr: SocketAddr = config.server.bind.parse()?;

    // Create application state
    let state = AppState::new(store, config, offset);

    // Start the background scheduler
    if !no_scheduler {
        Scheduler::new(Arc::clone(&state)).await.start();
    } else {
        info!("Disaggregation scheduler disabled");
    }

    // Build the router
    let app = Router::new()
        .merge(api::router())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    info!("Starting server on {}", addr);

    // Run the server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn run_disaggregation(config: Config, device: &str, dates: &[String]) -> anyhow::Result<()> {
    if !config.devices.iter().any(|d| d == device) {
        anyhow::bail!("device `{device}` is not registered; check the `devices` list in the config");
    }

    let offset = config.pipeline.offset()?;
    let store = CouchStore::new(
        &config.store.url,
        &config.store.username,
        &config.store.password,
    )?;
    let runner = CommandRunner::new(
        config.pipeline.runner.clone(),
        config.pipeline.output_dir.clone(),
    );
    let disaggregator = Disaggregator::new(runner, config.pipeline.input_path.clone());
    let today = OffsetDateTime::now_utc().to_offset(offset).date();

    for label in dates {
        let date = parse_day(label, today)?;
        info!(device, date = %label, "disaggregating");
        match process_device(&store, &disaggregator, offset, device, date).await {
            Ok(records) => info!(device, date = %label, records, "disaggregation complete"),
            Err(e) => error!(device, date = %label, "disaggregation failed: {e}"),
        }
    }

    Ok(())
}
