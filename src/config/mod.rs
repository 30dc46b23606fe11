//! Configuration module

use std::collections::HashSet;

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub api: ApiConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub devices: Vec<DeviceIdentity>,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Cloud account credentials and endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub token: String,
    pub user_id: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

/// A heater selected during onboarding
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeviceIdentity {
    pub name: String,
    pub sn: String,
    #[serde(default)]
    pub password: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8082
}

fn default_base_url() -> String {
    crate::youejia::client::DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_interval_secs() -> u64 {
    30
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::Environment::with_prefix("YOUEJIA").separator("__"))
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api.token.trim().is_empty() {
            anyhow::bail!("api.token must not be empty");
        }
        if self.api.user_id.trim().is_empty() {
            anyhow::bail!("api.user_id must not be empty");
        }
        url::Url::parse(&self.api.base_url)
            .map_err(|e| anyhow::anyhow!("api.base_url is not a valid URL: {}", e))?;

        if self.devices.is_empty() {
            anyhow::bail!("no devices configured");
        }

        let mut seen = HashSet::new();
        for device in &self.devices {
            if device.sn.trim().is_empty() {
                anyhow::bail!("device {} has an empty serial number", device.name);
            }
            if !seen.insert(device.sn.as_str()) {
                anyhow::bail!("duplicate device serial number: {}", device.sn);
            }
        }

        Ok(())
    }

    pub fn serial_numbers(&self) -> Vec<String> {
        self.devices.iter().map(|d| d.sn.clone()).collect()
    }
}
