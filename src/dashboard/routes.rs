//! Dashboard API route handlers.
//!
//! All endpoints return JSON. State is the shared `Controller`; every
//! handler only reads from it.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::engine::Controller;
use crate::types::{BetRecord, ControllerView, CrashBand, Notification};

pub type AppState = Arc<Controller>;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct NotificationQuery {
    /// Only return notifications with an id above this one.
    pub after: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CrashHistoryEntry {
    pub crash_point: f64,
    pub band: CrashBand,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /api/view
pub async fn get_view(State(controller): State<AppState>) -> Json<ControllerView> {
    Json(controller.view().await)
}

/// GET /api/notifications?after=<id>
///
/// Oldest first, so a follower can resume from the last id it saw.
pub async fn get_notifications(
    State(controller): State<AppState>,
    Query(query): Query<NotificationQuery>,
) -> Json<Vec<Notification>> {
    Json(controller.notifications_since(query.after.unwrap_or(0)).await)
}

/// GET /api/active-bets
pub async fn get_active_bets(State(controller): State<AppState>) -> Json<Vec<BetRecord>> {
    Json(controller.view().await.active_bets)
}

/// GET /api/crash-history
pub async fn get_crash_history(
    State(controller): State<AppState>,
) -> Json<Vec<CrashHistoryEntry>> {
    let history = controller.view().await.crash_history;
    Json(
        history
            .into_iter()
            .map(|crash_point| CrashHistoryEntry {
                crash_point,
                band: CrashBand::of(crash_point),
            })
            .collect(),
    )
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}
