// Copyright (c) 2026 Wrapt Contributors. MIT License.
// See LICENSE for details.

//! # Wrapt Node
//!
//! Entry point for the `wrapt-node` binary. Parses CLI arguments, loads
//! `config.toml`, initializes logging and metrics, opens the ledger
//! database and serves the HTTP API.
//!
//! - `run`    : start the node
//! - `init`   : create the data directory and a default `config.toml`
//! - `version`: print build version information

mod api;
mod cli;
mod config;
mod logging;
mod metrics;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;

use wrapt_ledger::storage::db::LAYOUT_VERSION;
use wrapt_ledger::{Ledger, LocalCustody, SledStore, Store};

use cli::{Commands, WraptNodeCli};
use config::{NodeConfig, CONFIG_FILE_NAME};
use metrics::NodeMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = WraptNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Init(args) => init_node(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the node: ledger, API server and metrics endpoint.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    let (config, source) = NodeConfig::resolve(&args)?;
    logging::init_logging(&config.logging.level, config.logging.format);

    tracing::info!(
        config = %source.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "defaults".into()),
        data_dir = %args.data_dir.display(),
        rpc = %config.rpc_addr(),
        metrics = %config.metrics_addr(),
        mint_policy = %config.ledger.mint_policy,
        faucet = config.custody.faucet_enabled,
        "starting wrapt-node"
    );

    // --- Persistent storage ---
    let db_path = args.data_dir.join("db");
    std::fs::create_dir_all(&db_path)
        .with_context(|| format!("failed to create database directory: {}", db_path.display()))?;

    let store = Arc::new(
        SledStore::open(&db_path)
            .with_context(|| format!("failed to open database at {}", db_path.display()))?,
    );
    tracing::info!(path = %db_path.display(), records = store.len(), "database opened");

    // --- Ledger ---
    let ledger = Arc::new(Ledger::new(
        Arc::clone(&store),
        LocalCustody::new(Arc::clone(&store)),
        config.ledger.clone(),
    ));

    // --- Metrics ---
    let node_metrics = Arc::new(NodeMetrics::new());
    if let Some(info) = ledger
        .token_info()
        .context("failed to read token info")?
    {
        tracing::info!(symbol = %info.symbol, total_supply = info.total_supply, "token loaded");
        node_metrics.observe_supply(&info);
    }

    // --- Application state ---
    let app_state = api::AppState {
        version: env!("CARGO_PKG_VERSION").to_string(),
        ledger,
        metrics: Arc::clone(&node_metrics),
        faucet_enabled: config.custody.faucet_enabled,
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = config.rpc_addr();
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = config.metrics_addr();
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
        }
    }

    store.flush().context("failed to flush database")?;
    tracing::info!("wrapt-node stopped");
    Ok(())
}

/// Creates the data directory and writes a default `config.toml`.
fn init_node(args: cli::InitArgs) -> Result<()> {
    logging::init_logging("wrapt_node=info", logging::LogFormat::Pretty);

    let data_dir = &args.data_dir;
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

    let config_path = data_dir.join(CONFIG_FILE_NAME);
    if config_path.exists() && !args.force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        );
    }

    let rendered = NodeConfig::default().to_toml()?;
    std::fs::write(&config_path, rendered)
        .with_context(|| format!("failed to write {}", config_path.display()))?;
    tracing::info!(path = %config_path.display(), "default configuration written");

    println!("Node initialized successfully.");
    println!("  Data directory : {}", data_dir.display());
    println!("  Configuration  : {}", config_path.display());

    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("wrapt-node {}", env!("CARGO_PKG_VERSION"));
    println!("db layout  {}", LAYOUT_VERSION);
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
