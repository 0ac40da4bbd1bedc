//! gk-daemon entry point.
//!
//! Thin on purpose: load config and secrets, boot the gate, start the chat
//! poller and serve the HTTP surface. Route handlers live in `routes.rs`,
//! shared state in `state.rs`, chat handling in `dispatch.rs`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use gk_config::{ConfigMode, UnusedKeyPolicy};
use gk_daemon::{dispatch::Dispatcher, routes, state, telegram, wiring};
use gk_gate::GateController;
use gk_oracle::TelegramMembershipOracle;
use gk_store::JsonFileStateStore;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, warn, Level};

const DEFAULT_CONFIG_PATH: &str = "config/gk.yaml";

#[tokio::main]
async fn main() -> Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let config_paths = config_paths_from_env();
    let paths: Vec<&str> = config_paths.iter().map(String::as_str).collect();
    let loaded = gk_config::load_layered_yaml(&paths)?;
    let report =
        gk_config::report_unused_keys(ConfigMode::Serve, &loaded.config_json, UnusedKeyPolicy::Warn)?;
    if !report.is_clean() {
        warn!(unused = ?report.unused_leaf_pointers, "config has keys no code reads");
    }
    let cfg = loaded.gate()?;
    let secrets = gk_config::secrets::resolve_secrets(&cfg, ConfigMode::Serve)?;
    let token = secrets.require_bot_token()?.to_string();
    info!(config_hash = %loaded.config_hash, channels = cfg.channel_count(), "config loaded");

    let oracle = TelegramMembershipOracle::new(
        token.clone(),
        cfg.telegram.api_base.clone(),
        cfg.telegram.oracle_timeout,
    )
    .map_err(|e| anyhow::anyhow!("ORACLE_INIT: {e}"))?;
    let store = JsonFileStateStore::new(cfg.state_path.clone());
    let gate = Arc::new(GateController::boot(
        wiring::roster_from_config(&cfg)?,
        wiring::required_joins(&cfg)?,
        Arc::new(oracle),
        Arc::new(store),
    ));

    let shared = Arc::new(state::AppState::new(Arc::clone(&gate)));
    state::spawn_heartbeat(shared.bus.clone(), Duration::from_secs(1));
    state::spawn_gate_relay(&gate, shared.bus.clone());

    let transport = Arc::new(
        telegram::TelegramTransport::new(
            token,
            cfg.telegram.api_base.clone(),
            cfg.telegram.poll_timeout_secs,
        )
        .map_err(|e| anyhow::anyhow!("TRANSPORT_INIT: {e}"))?,
    );
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&gate),
        transport.clone(),
        wiring::content_from_config(&cfg),
    ));
    telegram::spawn_polling(transport, dispatcher, cfg.telegram.poll_timeout_secs);

    let app = routes::build_router(Arc::clone(&shared)).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    let addr = bind_addr_from_env().unwrap_or(cfg.http_addr);
    info!("gk-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    info!("gk-daemon stopped");
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// `GK_CONFIG` holds comma-separated paths in merge order.
fn config_paths_from_env() -> Vec<String> {
    match std::env::var("GK_CONFIG") {
        Ok(v) if !v.trim().is_empty() => v
            .split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect(),
        _ => vec![DEFAULT_CONFIG_PATH.to_string()],
    }
}

/// `GK_HTTP_ADDR`, else `PORT` on all interfaces (hosting platforms set it).
fn bind_addr_from_env() -> Option<SocketAddr> {
    if let Some(addr) = std::env::var("GK_HTTP_ADDR")
        .ok()
        .and_then(|v| v.parse().ok())
    {
        return Some(addr);
    }
    let port: u16 = std::env::var("PORT").ok()?.parse().ok()?;
    Some(SocketAddr::from(([0, 0, 0, 0], port)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "ctrl-c handler failed");
    }
}
