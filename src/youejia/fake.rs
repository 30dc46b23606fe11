//! In-memory `HeaterApi` for coordinator and entity tests

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Notify;

use super::client::HeaterApi;
use super::models::{DeviceMode, Payload};
use crate::error::ApiError;

#[derive(Default)]
pub struct FakeHeaterApi {
    devices: Mutex<BTreeMap<String, Payload>>,
    pub get_devices_calls: AtomicUsize,
    pub set_calls: Mutex<Vec<String>>,
    pub fail_get_devices: AtomicBool,
    pub fail_set: AtomicBool,
    /// Makes the next `get_devices` call panic.
    pub panic_get_devices: AtomicBool,
    /// When set, `get_devices` blocks until `release_get_devices` is called.
    pub hold_get_devices: AtomicBool,
    gate: Notify,
    /// When set, set commands block until `release_set` is called.
    pub hold_set: AtomicBool,
    set_gate: Notify,
}

impl FakeHeaterApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_device(&self, sn: &str, target: f64, closed: bool) {
        let Value::Object(device) = json!({
            "sn": sn,
            "nickname": format!("Heater {}", sn),
            "type": 29,
            "k_close": closed,
            "is_heat": false,
            "temp": "19.0",
            "temp_status": target,
            "hw_temp_set": target,
            "mode": 0,
        }) else {
            unreachable!()
        };
        self.devices.lock().unwrap().insert(sn.to_string(), device);
    }

    pub fn remove_device(&self, sn: &str) {
        self.devices.lock().unwrap().remove(sn);
    }

    pub fn set_field(&self, sn: &str, key: &str, value: Value) {
        if let Some(device) = self.devices.lock().unwrap().get_mut(sn) {
            device.insert(key.to_string(), value);
        }
    }

    pub fn server_device(&self, sn: &str) -> Option<Payload> {
        self.devices.lock().unwrap().get(sn).cloned()
    }

    pub fn release_get_devices(&self) {
        self.gate.notify_one();
    }

    pub fn release_set(&self) {
        self.set_gate.notify_one();
    }

    pub fn set_calls(&self) -> Vec<String> {
        self.set_calls.lock().unwrap().clone()
    }

    async fn apply_set(
        &self,
        sn: &str,
        call: String,
        key: &str,
        value: Value,
    ) -> Result<Payload, ApiError> {
        self.set_calls.lock().unwrap().push(call);
        if self.hold_set.load(Ordering::SeqCst) {
            self.set_gate.notified().await;
        }
        if self.fail_set.load(Ordering::SeqCst) {
            return Err(ApiError::Remote(1));
        }

        let mut devices = self.devices.lock().unwrap();
        let device = devices.get_mut(sn).ok_or(ApiError::Remote(404))?;
        device.insert(key.to_string(), value);
        Ok(device.clone())
    }
}

#[async_trait]
impl HeaterApi for FakeHeaterApi {
    async fn get_user_info(&self) -> Result<Payload, ApiError> {
        let devices: Vec<Value> = self
            .devices
            .lock()
            .unwrap()
            .values()
            .cloned()
            .map(Value::Object)
            .collect();
        let Value::Object(payload) = json!({ "devices": devices }) else {
            unreachable!()
        };
        Ok(payload)
    }

    async fn get_devices(&self, serial_numbers: &[String]) -> Result<Payload, ApiError> {
        if serial_numbers.is_empty() {
            return Err(ApiError::EmptyInput);
        }
        self.get_devices_calls.fetch_add(1, Ordering::SeqCst);
        if self.panic_get_devices.swap(false, Ordering::SeqCst) {
            panic!("device batch handler crashed");
        }
        if self.hold_get_devices.load(Ordering::SeqCst) {
            self.gate.notified().await;
        }
        if self.fail_get_devices.load(Ordering::SeqCst) {
            return Err(ApiError::Timeout);
        }

        let devices: Vec<Value> = {
            let devices = self.devices.lock().unwrap();
            serial_numbers
                .iter()
                .filter_map(|sn| devices.get(sn).cloned())
                .map(Value::Object)
                .collect()
        };
        let Value::Object(payload) = json!({ "dev": devices }) else {
            unreachable!()
        };
        Ok(payload)
    }

    async fn set_power(
        &self,
        serial_number: &str,
        _password: &str,
        power_on: bool,
    ) -> Result<Payload, ApiError> {
        self.apply_set(
            serial_number,
            format!("power:{}", power_on),
            "k_close",
            json!(!power_on),
        )
        .await
    }

    async fn set_temperature(
        &self,
        serial_number: &str,
        _password: &str,
        temperature: f64,
    ) -> Result<Payload, ApiError> {
        let whole = temperature.trunc() as i64;
        self.apply_set(
            serial_number,
            format!("temperature:{}", whole),
            "temp_status",
            json!(whole),
        )
        .await
    }

    async fn set_mode(
        &self,
        serial_number: &str,
        _password: &str,
        mode: DeviceMode,
    ) -> Result<Payload, ApiError> {
        self.apply_set(
            serial_number,
            format!("mode:{}", mode.as_i64()),
            "mode",
            json!(mode.as_i64()),
        )
        .await
    }
}
