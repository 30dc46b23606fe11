//! API module - HTTP handlers and routes

pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        .route("/api/health", get(handlers::health_check))
        // Heaters
        .route("/api/heaters", get(handlers::list_heaters))
        .route("/api/heaters/:sn", get(handlers::get_heater))
        .route("/api/heaters/:sn/hvac_mode", post(handlers::set_hvac_mode))
        .route("/api/heaters/:sn/turn_on", post(handlers::turn_on))
        .route("/api/heaters/:sn/turn_off", post(handlers::turn_off))
        .route("/api/heaters/:sn/temperature", post(handlers::set_temperature))
        .route("/api/heaters/:sn/preset", post(handlers::set_preset))
        .route("/api/heaters/:sn/mode", post(handlers::set_mode))
        // Coordinator
        .route("/api/coordinator", get(handlers::get_coordinator_status))
        .route("/api/refresh", post(handlers::trigger_refresh))
        // Onboarding
        .route("/api/discover", get(handlers::discover))
}
