use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, warn};

use football_pulse::api::{router, ApiState};
use football_pulse::cell::LatencyStats;
use football_pulse::config::Config;
use football_pulse::credential::CredentialStore;
use football_pulse::error::{AppError, Result};
use football_pulse::logging;
use football_pulse::panel::{PanelRegistry, Panels};

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = logging::init(&cfg.log_level, cfg.log_json) {
        eprintln!("{e}");
        std::process::exit(1);
    }

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Credential ---
    let credentials = CredentialStore::new(&cfg.credential_path);
    let credential = credentials
        .resolve(cfg.football_api_key.as_deref())?
        .ok_or_else(|| {
            AppError::Config(format!(
                "no API key: set FOOTBALL_API_KEY or save one to {}",
                credentials.path().display()
            ))
        })?;
    if cfg.football_api_key.is_none() {
        info!(path = %credentials.path().display(), "Using saved API credential");
    }

    // --- Panels ---
    let latency = Arc::new(LatencyStats::new());
    let panels = Panels::build(&cfg, credential, Arc::clone(&latency))?;
    let registry = PanelRegistry::new();
    panels.register_all(&registry);
    info!(
        "Panels ready: {} registered (matches={}ms, odds={}ms, in-play={})",
        registry.len(),
        cfg.matches_poll.as_millis(),
        cfg.odds_poll.as_millis(),
        if cfg.inplay_configured() {
            format!("{}ms", cfg.inplay_poll.as_millis())
        } else {
            "off".to_string()
        },
    );
    if !cfg.odds_start_enabled {
        info!("Live odds panel starts closed; POST /panels/live_odds/enable to open it");
    }

    // --- HTTP API server ---
    let api_state = ApiState {
        registry: Arc::clone(&registry),
        prediction: Arc::clone(&panels.prediction),
        credentials,
        latency,
        started_at: Instant::now(),
    };
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    registry.teardown_all();
    info!("All panels torn down; bye");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
