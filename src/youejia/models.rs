//! Wire and device models for the YoueJia ubus endpoint

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ApiError, HeaterError};

/// JSON object returned as element 1 of a ubus `result`.
pub type Payload = Map<String, Value>;

/// Keyed view of every configured heater, replaced wholesale on each poll.
pub type DeviceSnapshot = HashMap<String, DeviceState>;

/// `type` value the cloud reports for electric heaters
pub const HEATER_DEVICE_TYPE: i64 = 29;

// ============================================================================
// Envelope
// ============================================================================

pub const JSONRPC_VERSION: &str = "2.0";
pub const UBUS_METHOD: &str = "call";

/// Outbound ubus envelope. `params` serializes as
/// `[token, target, action, payload]`.
#[derive(Debug, Serialize)]
pub struct UbusRequest<'a> {
    pub id: u64,
    pub jsonrpc: &'static str,
    pub method: &'static str,
    pub params: (&'a str, &'a str, &'a str, &'a Payload),
}

// ============================================================================
// Device mode
// ============================================================================

/// Working mode accepted by the `set` action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceMode {
    Constant,
    Smart,
    Vacation,
}

impl DeviceMode {
    pub fn as_i64(self) -> i64 {
        match self {
            DeviceMode::Constant => 0,
            DeviceMode::Smart => 1,
            DeviceMode::Vacation => 2,
        }
    }
}

impl TryFrom<i64> for DeviceMode {
    type Error = ApiError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(DeviceMode::Constant),
            1 => Ok(DeviceMode::Smart),
            2 => Ok(DeviceMode::Vacation),
            other => Err(ApiError::InvalidMode(other)),
        }
    }
}

// ============================================================================
// Device state
// ============================================================================

/// Server-reported state of one heater.
///
/// Only the fields the climate entity needs get typed accessors; everything
/// else (`hw_temp_set`, `rssi`, `offline`, energy counters, ...) is kept as
/// reported.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceState(Payload);

impl DeviceState {
    pub const FIELD_SN: &'static str = "sn";
    pub const FIELD_CLOSED: &'static str = "k_close";
    pub const FIELD_TEMPERATURE: &'static str = "temp";
    pub const FIELD_TARGET_TEMPERATURE: &'static str = "temp_status";
    pub const FIELD_HEATING: &'static str = "is_heat";
    pub const FIELD_MODE: &'static str = "mode";

    pub fn new(fields: Payload) -> Self {
        Self(fields)
    }

    pub fn sn(&self) -> Option<&str> {
        self.0.get(Self::FIELD_SN).and_then(Value::as_str)
    }

    /// Power-closed flag. A missing flag reads as powered on.
    pub fn is_closed(&self) -> bool {
        truthy(self.0.get(Self::FIELD_CLOSED))
    }

    pub fn set_closed(&mut self, closed: bool) {
        self.0.insert(Self::FIELD_CLOSED.to_string(), Value::Bool(closed));
    }

    pub fn is_heating(&self) -> bool {
        truthy(self.0.get(Self::FIELD_HEATING))
    }

    /// Measured room temperature
    pub fn temperature(&self) -> Result<f64, HeaterError> {
        self.parse_float(Self::FIELD_TEMPERATURE)
    }

    /// Target temperature the device is regulating to
    pub fn target_temperature(&self) -> Result<f64, HeaterError> {
        self.parse_float(Self::FIELD_TARGET_TEMPERATURE)
    }

    pub fn mode(&self) -> Option<DeviceMode> {
        self.0
            .get(Self::FIELD_MODE)
            .and_then(Value::as_i64)
            .and_then(|m| DeviceMode::try_from(m).ok())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The cloud reports temperatures either as numbers or numeric strings.
    fn parse_float(&self, field: &'static str) -> Result<f64, HeaterError> {
        let value = self.0.get(field);
        let parsed = match value {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        };

        parsed.ok_or_else(|| HeaterError::Parse {
            field,
            value: value.map(Value::to_string).unwrap_or_else(|| "missing".to_string()),
        })
    }
}

impl From<Payload> for DeviceState {
    fn from(fields: Payload) -> Self {
        Self(fields)
    }
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

/// Build a snapshot from a `user_dev_info` payload (`{"dev": [...]}`).
pub fn parse_device_batch(mut payload: Payload) -> Result<DeviceSnapshot, ApiError> {
    let devices = match payload.remove("dev") {
        Some(Value::Array(list)) => list,
        other => {
            return Err(ApiError::MalformedResponse(format!(
                "dev list missing from device batch: {}",
                other.map(|v| v.to_string()).unwrap_or_else(|| "null".to_string())
            )))
        }
    };

    let mut snapshot = DeviceSnapshot::with_capacity(devices.len());
    for entry in devices {
        let fields = match entry {
            Value::Object(fields) => fields,
            other => {
                tracing::warn!("[YoueJia] Skipping non-object device entry: {}", other);
                continue;
            }
        };
        let state = DeviceState::new(fields);
        match state.sn() {
            Some(sn) => {
                snapshot.insert(sn.to_string(), state);
            }
            None => tracing::warn!("[YoueJia] Skipping device entry without sn"),
        }
    }

    Ok(snapshot)
}

// ============================================================================
// User info (onboarding)
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub devices: Vec<DeviceSummary>,
}

/// Device entry of `user_get_info`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSummary {
    pub sn: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(rename = "type")]
    pub device_type: i64,
    #[serde(default)]
    pub offline: Option<bool>,
}

impl UserInfo {
    pub fn from_payload(payload: Payload) -> Result<Self, ApiError> {
        serde_json::from_value(Value::Object(payload))
            .map_err(|e| ApiError::MalformedResponse(format!("user info: {}", e)))
    }

    /// Devices that are heaters and can be added as climate entities
    pub fn heaters(&self) -> impl Iterator<Item = &DeviceSummary> {
        self.devices
            .iter()
            .filter(|d| d.device_type == HEATER_DEVICE_TYPE)
    }
}
