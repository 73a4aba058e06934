pub mod state;

use anyhow::Result;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use handlewatch_scheduler::{invert_watchlists, CycleReport};
use serde::Serialize;
use tower_http::trace::TraceLayer;

pub use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: i64,
    pub subscribers: usize,
    pub watched_targets: usize,
    pub known_targets: usize,
    pub persist_failures: u64,
    pub watchlist_persist_failures: u64,
    pub last_cycle: Option<CycleReport>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(state: AppState, addr: &str) -> Result<()> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("health server listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn home() -> &'static str {
    "handlewatch is running"
}

async fn health(State(state): State<AppState>) -> Json<Health> {
    let monitor = &state.monitor;
    let watchlists = monitor.registry().get_all().await;
    let book = monitor.book();

    Json(Health {
        status: "ok",
        started_at: state.started_at,
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
        subscribers: watchlists.len(),
        watched_targets: invert_watchlists(&watchlists).len(),
        known_targets: book.len().await,
        persist_failures: book.persist_failures(),
        watchlist_persist_failures: monitor.registry().persist_failures(),
        last_cycle: monitor.last_report().await,
    })
}
