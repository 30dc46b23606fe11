//! Heater (climate entity) handlers

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};

use crate::climate::heater::{MAX_TEMP, MIN_TEMP};
use crate::climate::ClimateState;
use crate::error::AppError;
use crate::models::{SetHvacModeRequest, SetModeRequest, SetPresetRequest, SetTemperatureRequest};
use crate::state::AppState;
use crate::youejia::models::DeviceMode;

/// GET /api/heaters - State of every configured heater
pub async fn list_heaters(State(state): State<AppState>) -> impl IntoResponse {
    let mut states: Vec<ClimateState> = Vec::with_capacity(state.heaters.len());
    for heater in state.heaters.iter() {
        states.push(heater.state().await);
    }

    Json(states)
}

/// GET /api/heaters/:sn - State of one heater
pub async fn get_heater(
    State(state): State<AppState>,
    Path(sn): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let heater = state.heater(&sn)?;
    Ok(Json(heater.state().await))
}

/// POST /api/heaters/:sn/hvac_mode - Switch between heat and off
pub async fn set_hvac_mode(
    State(state): State<AppState>,
    Path(sn): Path<String>,
    Json(payload): Json<SetHvacModeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let heater = state.heater(&sn)?;
    heater.set_hvac_mode(payload.hvac_mode).await?;
    Ok(Json(heater.state().await))
}

/// POST /api/heaters/:sn/turn_on
pub async fn turn_on(
    State(state): State<AppState>,
    Path(sn): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let heater = state.heater(&sn)?;
    heater.turn_on().await?;
    Ok(Json(heater.state().await))
}

/// POST /api/heaters/:sn/turn_off
pub async fn turn_off(
    State(state): State<AppState>,
    Path(sn): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let heater = state.heater(&sn)?;
    heater.turn_off().await?;
    Ok(Json(heater.state().await))
}

/// POST /api/heaters/:sn/temperature - Set target temperature
pub async fn set_temperature(
    State(state): State<AppState>,
    Path(sn): Path<String>,
    Json(payload): Json<SetTemperatureRequest>,
) -> Result<impl IntoResponse, AppError> {
    let heater = state.heater(&sn)?;

    let temperature = payload.temperature;
    if !temperature.is_finite() || !(MIN_TEMP..=MAX_TEMP).contains(&temperature) {
        return Err(AppError::BadRequest(format!(
            "Temperature {} outside {}..={}",
            temperature, MIN_TEMP, MAX_TEMP
        )));
    }

    heater.set_temperature(temperature).await?;
    Ok(Json(heater.state().await))
}

/// POST /api/heaters/:sn/preset - Enter or leave boost
pub async fn set_preset(
    State(state): State<AppState>,
    Path(sn): Path<String>,
    Json(payload): Json<SetPresetRequest>,
) -> Result<impl IntoResponse, AppError> {
    let heater = state.heater(&sn)?;
    heater.set_preset_mode(payload.preset_mode).await?;
    Ok(Json(heater.state().await))
}

/// POST /api/heaters/:sn/mode - Set device working mode (0/1/2)
pub async fn set_mode(
    State(state): State<AppState>,
    Path(sn): Path<String>,
    Json(payload): Json<SetModeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let heater = state.heater(&sn)?;
    let mode = DeviceMode::try_from(payload.mode)?;
    heater.set_operating_mode(mode).await?;
    Ok(Json(heater.state().await))
}
