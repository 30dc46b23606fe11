//! YoueJia cloud API client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::models::{DeviceMode, Payload};
use super::transport::UbusTransport;
use crate::config::ApiConfig;
use crate::error::ApiError;

pub const DEFAULT_BASE_URL: &str = "https://cn.zncn.net.cn";

const FLAVOR: &str = "UeHome";
const LANG: i64 = 1;
const PLATFORM: i64 = 1;
const VERSION: i64 = 1;

const TARGET_USER_INFO: &str = "db_agent2";
const ACTION_USER_INFO: &str = "user_get_info";
const TARGET_DEVICE_INFO: &str = "user_mgr";
const ACTION_DEVICE_INFO: &str = "user_dev_info";
const ACTION_SET: &str = "set";

/// Operations the coordinator and climate entities need from the cloud.
#[async_trait]
pub trait HeaterApi: Send + Sync {
    /// Account info; `devices` lists every device bound to the user
    async fn get_user_info(&self) -> Result<Payload, ApiError>;

    /// Batch state of the given heaters (`{"dev": [...]}`)
    async fn get_devices(&self, serial_numbers: &[String]) -> Result<Payload, ApiError>;

    async fn set_power(
        &self,
        serial_number: &str,
        password: &str,
        power_on: bool,
    ) -> Result<Payload, ApiError>;

    async fn set_temperature(
        &self,
        serial_number: &str,
        password: &str,
        temperature: f64,
    ) -> Result<Payload, ApiError>;

    async fn set_mode(
        &self,
        serial_number: &str,
        password: &str,
        mode: DeviceMode,
    ) -> Result<Payload, ApiError>;
}

pub struct YoueJiaClient {
    token: String,
    user_id: String,
    transport: UbusTransport,
}

impl YoueJiaClient {
    pub fn new(token: impl Into<String>, user_id: impl Into<String>, base_url: &str) -> Self {
        Self::with_transport(
            token,
            user_id,
            UbusTransport::new(base_url, super::transport::DEFAULT_TIMEOUT),
        )
    }

    /// Client sharing an existing HTTP client; closing this client leaves it open
    pub fn with_http_client(
        token: impl Into<String>,
        user_id: impl Into<String>,
        base_url: &str,
        http_client: Client,
    ) -> Self {
        Self::with_transport(token, user_id, UbusTransport::with_client(base_url, http_client))
    }

    pub fn from_config(config: &ApiConfig) -> Self {
        Self::with_transport(
            config.token.clone(),
            config.user_id.clone(),
            UbusTransport::new(&config.base_url, Duration::from_secs(config.timeout_secs)),
        )
    }

    fn with_transport(
        token: impl Into<String>,
        user_id: impl Into<String>,
        transport: UbusTransport,
    ) -> Self {
        Self {
            token: token.into(),
            user_id: user_id.into(),
            transport,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Release the HTTP session if this client created it
    pub async fn close(&self) {
        self.transport.close().await;
    }

    /// Vendor constants present in every payload, plus `extra`
    fn payload(extra: Value) -> Payload {
        let mut payload = Payload::new();
        payload.insert("flavor".to_string(), json!(FLAVOR));
        payload.insert("lang".to_string(), json!(LANG));
        payload.insert("platform".to_string(), json!(PLATFORM));
        payload.insert("version".to_string(), json!(VERSION));
        if let Value::Object(extra) = extra {
            payload.extend(extra);
        }
        payload
    }

    async fn set(&self, serial_number: &str, payload: Payload) -> Result<Payload, ApiError> {
        self.transport
            .post(&self.token, serial_number, ACTION_SET, &payload)
            .await
    }
}

#[async_trait]
impl HeaterApi for YoueJiaClient {
    async fn get_user_info(&self) -> Result<Payload, ApiError> {
        let payload = Self::payload(json!({ "user_id": self.user_id }));
        self.transport
            .post(&self.token, TARGET_USER_INFO, ACTION_USER_INFO, &payload)
            .await
    }

    async fn get_devices(&self, serial_numbers: &[String]) -> Result<Payload, ApiError> {
        if serial_numbers.is_empty() {
            return Err(ApiError::EmptyInput);
        }

        let payload = Self::payload(json!({ "dev_sn": serial_numbers }));
        self.transport
            .post(&self.token, TARGET_DEVICE_INFO, ACTION_DEVICE_INFO, &payload)
            .await
    }

    async fn set_power(
        &self,
        serial_number: &str,
        password: &str,
        power_on: bool,
    ) -> Result<Payload, ApiError> {
        let payload = Self::payload(json!({
            "k_close": !power_on,
            "p_w": password,
        }));
        self.set(serial_number, payload).await
    }

    async fn set_temperature(
        &self,
        serial_number: &str,
        password: &str,
        temperature: f64,
    ) -> Result<Payload, ApiError> {
        // The device only accepts whole degrees; fractions are truncated.
        let payload = Self::payload(json!({
            "hw_temp_set": temperature.trunc() as i64,
            "p_w": password,
        }));
        self.set(serial_number, payload).await
    }

    async fn set_mode(
        &self,
        serial_number: &str,
        password: &str,
        mode: DeviceMode,
    ) -> Result<Payload, ApiError> {
        let payload = Self::payload(json!({
            "mode": mode.as_i64(),
            "p_w": password,
        }));
        self.set(serial_number, payload).await
    }
}
