//! Trueque marketplace backend — entry point.
//!
//! Serves the barter-marketplace REST API (requests, exchanges, chat,
//! notifications) over SQLite, plus a WebSocket room per exchange for
//! realtime chat and state events. A background task periodically sweeps
//! expired confirmation deadlines; the read paths reconcile them lazily
//! as well.

mod api;
mod auth;
mod config;
mod db;
mod errors;
mod events;
mod exchange;
mod messages;
mod models;
mod realtime;
mod requests;
mod sweeper;

#[cfg(test)]
mod test_sweep;

use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use api::AppState;
use config::Config;
use realtime::Rooms;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    // Load config from environment.
    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;

    // Set up the SQLite connection pool and run migrations.
    let pool = db::init_pool(&config.database_url).await?;

    // Room registry shared between HTTP handlers, sockets and the sweeper.
    let rooms = Arc::new(Rooms::new());

    // ─── Background deadline sweeper ──────────────────────
    let sweeper_state = Arc::new(sweeper::SweeperState {
        pool: pool.clone(),
        rooms: Arc::clone(&rooms),
        interval_secs: config.sweep_interval_secs,
    });
    tokio::spawn(sweeper::run(sweeper_state));

    // ─── REST API + realtime ──────────────────────────────
    let state = AppState {
        pool,
        rooms,
        auth_secret: config.auth_secret.clone(),
    };

    let app = api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.api_port);
    info!("API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
