use std::sync::Arc;
use std::time::Duration;

use algoguard::{
    actors::{CheckExecutor, Scheduler},
    api::{ApiConfig, ApiState, spawn_api_server},
    config::read_config_file,
    datasource::PrometheusConnector,
    metrics::CheckMetrics,
    plugins::{build_actioners, build_algorithmers},
    storage,
    util::{api_addr_override, get_working_dir},
};
use anyhow::Context;
use clap::Parser;
use tracing::{debug, error, info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file
    #[arg(short = 'c', long = "config", default_value = "algoguard.json")]
    file: String,

    /// Verbose logging
    #[arg(short, long)]
    debug: bool,
}

fn init(debug: bool) {
    let level = if debug {
        LevelFilter::TRACE
    } else {
        LevelFilter::INFO
    };
    let filter = filter::Targets::new().with_targets(vec![
        ("algoguard", level),
        ("algoguard_agent", level),
        ("tower_http", LevelFilter::INFO),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init(args.debug);
    trace!("started with args: {args:?}");

    let mut config = read_config_file(&args.file)
        .with_context(|| format!("unable to load config file {}", args.file))?;
    config.apply_overrides(api_addr_override());
    if let Err(e) = config.validate() {
        error!("invalid configuration: {e}");
        return Err(e.into());
    }
    debug!(
        "loaded {} datasources, {} algorithmers, {} actioners, {} checks",
        config.datasources.len(),
        config.algorithmers.len(),
        config.actioners.len(),
        config.checks.len()
    );

    let store = storage::open(&config.storage).await?;
    let metrics = Arc::new(CheckMetrics::new().context("unable to register run counters")?);

    let executor = CheckExecutor::new(
        config.datasources.clone(),
        Arc::new(PrometheusConnector::new()?),
        build_algorithmers(&config.algorithmers),
        build_actioners(&config.actioners),
        Arc::clone(&store),
        Arc::clone(&metrics),
    )
    .with_base_working_dir(config.base_working_dir.clone().or_else(get_working_dir));

    let scheduler = Scheduler::start(config.checks.clone(), Arc::new(executor));

    let api = spawn_api_server(
        ApiConfig {
            bind_addr: config.api_listen_addr,
            enable_cors: true,
        },
        ApiState::new(Arc::clone(&store), metrics),
    )
    .await?;

    wait_for_signal().await;
    info!("shutdown signal received");

    scheduler.shutdown().await;
    api.stop(Duration::from_secs(config.shutdown_grace_secs)).await;

    if let Err(e) = store.close().await {
        error!("failed to close history store: {e}");
    }

    info!("bye");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(terminate) => terminate,
        Err(e) => {
            error!("unable to listen for SIGTERM: {e}");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
