//! Coordinator and onboarding handlers

use axum::{extract::State, response::IntoResponse, Json};

use crate::error::AppError;
use crate::models::CoordinatorStatus;
use crate::state::AppState;
use crate::youejia::discover_heaters;

use super::SuccessResponse;

/// GET /api/coordinator - Outcome of the last refresh
pub async fn get_coordinator_status(State(state): State<AppState>) -> impl IntoResponse {
    let coordinator = &state.coordinator;

    Json(CoordinatorStatus {
        last_update_success: coordinator.last_update_success().await,
        last_update_success_time: coordinator.last_update_success_time().await,
        last_error: coordinator.last_error().await,
        heater_count: state.heaters.len(),
        reported_count: coordinator.snapshot().await.len(),
        uptime_seconds: state.uptime_seconds(),
    })
}

/// POST /api/refresh - Refresh now, or wait for the refresh in flight
pub async fn trigger_refresh(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    state.coordinator.async_refresh().await?;
    Ok(Json(SuccessResponse::new("Refresh complete")))
}

/// GET /api/discover - Heaters bound to the configured account
pub async fn discover(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let heaters = discover_heaters(state.api.as_ref()).await?;
    Ok(Json(heaters))
}
