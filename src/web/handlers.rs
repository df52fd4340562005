use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use crate::error::CacheError;
use crate::models::{GameStats, RoundSummary};
use crate::web::state::WebSharedState;

impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match self {
            CacheError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::AlreadyStarted | CacheError::Stopped => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = match self {
            CacheError::NotReady => json!({ "status": "initializing" }),
            other => json!({ "status": "error", "message": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Serialize)]
pub struct IndexView {
    pub round: Option<RoundSummary>,
    pub stats: GameStats,
    pub generation: u64,
    pub last_updated: String,
    pub update_time: String,
}

pub fn pretty_time(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%d %H:%M UTC").to_string()
}

pub fn pretty_duration(d: Duration) -> String {
    let minutes = d.as_secs_f64() / 60.0;
    if minutes >= 1.0 {
        format!("{:.1}min", minutes)
    } else {
        format!("{:.1}sec", d.as_secs_f64())
    }
}

/// Handler for /api/index - latest round and overall stats
pub async fn get_index(State(state): State<WebSharedState>) -> Result<Json<IndexView>, CacheError> {
    let snapshot = state.cache.current()?;
    Ok(Json(IndexView {
        round: snapshot.latest_round.clone(),
        stats: snapshot.game_stats.clone(),
        generation: snapshot.generation,
        last_updated: pretty_time(snapshot.computed_at),
        update_time: pretty_duration(snapshot.compute_duration),
    }))
}

/// Handler for /api/snapshot - the whole current generation
pub async fn get_snapshot(State(state): State<WebSharedState>) -> Result<Response, CacheError> {
    let snapshot = state.cache.current()?;
    Ok(Json(&*snapshot).into_response())
}

pub async fn get_latest_round(State(state): State<WebSharedState>) -> Result<Response, CacheError> {
    Ok(Json(state.cache.latest_round()?).into_response())
}

pub async fn get_game_stats(State(state): State<WebSharedState>) -> Result<Response, CacheError> {
    Ok(Json(state.cache.game_stats()?).into_response())
}

pub async fn get_game_modes(State(state): State<WebSharedState>) -> Result<Response, CacheError> {
    Ok(Json(state.cache.game_modes()?).into_response())
}

pub async fn get_countries(State(state): State<WebSharedState>) -> Result<Response, CacheError> {
    Ok(Json(state.cache.countries()?).into_response())
}

pub async fn get_health(State(state): State<WebSharedState>) -> Response {
    match state.cache.snapshot() {
        Some(snapshot) => Json(json!({
            "status": "ok",
            "refreshing": state.cache.is_running(),
            "generation": snapshot.generation,
            "computed_at": snapshot.computed_at,
        }))
        .into_response(),
        None => CacheError::NotReady.into_response(),
    }
}
