//! Request/response models for the control API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::climate::{HvacMode, PresetMode};

// ============================================================================
// Heater commands
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SetHvacModeRequest {
    pub hvac_mode: HvacMode,
}

#[derive(Debug, Deserialize)]
pub struct SetTemperatureRequest {
    pub temperature: f64,
}

#[derive(Debug, Deserialize)]
pub struct SetPresetRequest {
    pub preset_mode: PresetMode,
}

/// Raw integer so out-of-range values reach the mode validation
#[derive(Debug, Deserialize)]
pub struct SetModeRequest {
    pub mode: i64,
}

// ============================================================================
// Coordinator
// ============================================================================

#[derive(Debug, Serialize)]
pub struct CoordinatorStatus {
    pub last_update_success: bool,
    pub last_update_success_time: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub heater_count: usize,
    pub reported_count: usize,
    pub uptime_seconds: u64,
}
