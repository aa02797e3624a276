//! Process entry point: parse startup flags, wire every component, and
//! serve until a shutdown signal arrives.

#![deny(unsafe_code)]

use clap::Parser;
use ember_blob::{BlobRepository, PathManager};
use ember_core::uptime::UptimeTracker;
use ember_index::{IndexClient, Throttle};
use ember_reaper::{Reaper, ReaperConfig};
use ember_server::config::Settings;
use ember_server::state::AppState;
use ember_words::Wordlist;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "ember-server", about = "Ephemeral file-sharing service")]
struct Cli {
    /// Alternate path to an env file, in place of the default `.env` lookup.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overrides RAVEN_LOG_LEVEL.
    #[arg(long)]
    log_level: Option<String>,

    /// Overrides RAVEN_BIND_ADDR.
    #[arg(long)]
    bind: Option<SocketAddr>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut settings = match Settings::load(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("fatal: invalid configuration: {err}");
            std::process::exit(1);
        }
    };
    if let Some(level) = cli.log_level {
        settings.log_level = level;
    }
    if let Some(bind) = cli.bind {
        settings.bind_addr = bind;
    }

    if let Err(err) = ember_telemetry::init_logging(&settings.log_level, settings.log_json) {
        eprintln!("fatal: logging already initialized: {err}");
        std::process::exit(1);
    }

    let index = match IndexClient::connect(&settings.redis_url, settings.redis_max_connections).await {
        Ok(index) => index,
        Err(err) => {
            tracing::error!(error = %err, "fatal_redis_unreachable");
            std::process::exit(1);
        }
    };

    let paths = match PathManager::new(&settings.storage_path) {
        Ok(paths) => paths,
        Err(err) => {
            tracing::error!(error = %err, "fatal_storage_path_not_creatable");
            std::process::exit(1);
        }
    };
    let blob = BlobRepository::new(settings.shred_passes);

    let wordlist = match Wordlist::load(&settings.wordlist_path) {
        Ok(wordlist) => wordlist,
        Err(err) => {
            tracing::error!(error = %err, "fatal_wordlist_load_failed");
            std::process::exit(1);
        }
    };

    let throttle = Throttle::new(index.pool(), settings.failure_counter_ttl_seconds());
    let uptime = UptimeTracker::start();
    let settings = Arc::new(settings);

    let reaper = Reaper::new(
        index.clone(),
        paths.clone(),
        blob,
        ReaperConfig::new(settings.cleanup_interval_minutes, settings.orphan_age_minutes),
    );
    let reaper_handles = reaper.spawn();

    let state = AppState {
        index,
        blob,
        paths,
        wordlist: Arc::new(wordlist),
        throttle,
        uptime,
        settings: Arc::clone(&settings),
    };

    let app = ember_server::http::build(state);
    let listener = match tokio::net::TcpListener::bind(settings.bind_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(error = %err, addr = %settings.bind_addr, "fatal_bind_failed");
            std::process::exit(1);
        }
    };

    tracing::info!(addr = %settings.bind_addr, "server_listening");

    if let Err(err) = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %err, "server_error");
    }

    reaper_handles.abort();
    tracing::info!("server_shutdown_complete");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("shutdown_signal_received");
}
