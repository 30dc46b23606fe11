//! Heater climate entity
//!
//! Answers state queries from its slice of the coordinator snapshot and
//! turns host commands into cloud calls. Power changes are shown
//! optimistically before the call returns; the call's response then
//! replaces the entry. A failed call leaves the optimistic value in place
//! until the next successful poll.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::config::DeviceIdentity;
use crate::error::HeaterError;
use crate::youejia::models::{DeviceMode, DeviceState};
use crate::youejia::{HeaterApi, HeaterCoordinator};

/// Target temperature that stands for the boost preset
pub const BOOST_TEMPERATURE: f64 = 30.0;
/// Used when leaving boost without a remembered temperature
pub const DEFAULT_RESTORE_TEMPERATURE: f64 = 22.0;

pub const MIN_TEMP: f64 = 10.0;
pub const MAX_TEMP: f64 = 28.0;
pub const TARGET_TEMPERATURE_STEP: f64 = 1.0;
pub const TEMPERATURE_UNIT: &str = "°C";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HvacMode {
    Heat,
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HvacAction {
    Off,
    Heating,
    Idle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresetMode {
    Normal,
    Boost,
}

pub const HVAC_MODES: [HvacMode; 2] = [HvacMode::Heat, HvacMode::Off];
pub const PRESET_MODES: [PresetMode; 2] = [PresetMode::Normal, PresetMode::Boost];

/// Everything the host displays for one heater
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClimateState {
    pub unique_id: String,
    pub name: String,
    pub sn: String,
    pub available: bool,
    pub hvac_mode: Option<HvacMode>,
    pub hvac_action: Option<HvacAction>,
    pub current_temperature: Option<f64>,
    pub target_temperature: Option<f64>,
    pub preset_mode: Option<PresetMode>,
    pub device_mode: Option<DeviceMode>,
    pub hvac_modes: Vec<HvacMode>,
    pub preset_modes: Vec<PresetMode>,
    pub min_temp: f64,
    pub max_temp: f64,
    pub target_temperature_step: f64,
    pub temperature_unit: &'static str,
}

impl ClimateState {
    fn new(identity: &DeviceIdentity, device: Option<&DeviceState>) -> Self {
        Self {
            unique_id: unique_id(&identity.sn),
            name: identity.name.clone(),
            sn: identity.sn.clone(),
            available: device.is_some(),
            hvac_mode: device.map(hvac_mode_of),
            hvac_action: device.map(hvac_action_of),
            current_temperature: device.and_then(|d| d.temperature().ok()),
            target_temperature: device.and_then(|d| d.target_temperature().ok()),
            preset_mode: device.and_then(|d| preset_mode_of(d).ok()),
            device_mode: device.and_then(DeviceState::mode),
            hvac_modes: HVAC_MODES.to_vec(),
            preset_modes: PRESET_MODES.to_vec(),
            min_temp: MIN_TEMP,
            max_temp: MAX_TEMP,
            target_temperature_step: TARGET_TEMPERATURE_STEP,
            temperature_unit: TEMPERATURE_UNIT,
        }
    }
}

pub fn unique_id(sn: &str) -> String {
    format!("{}_youejia_thermostat", sn)
}

fn hvac_mode_of(device: &DeviceState) -> HvacMode {
    if device.is_closed() {
        HvacMode::Off
    } else {
        HvacMode::Heat
    }
}

fn hvac_action_of(device: &DeviceState) -> HvacAction {
    if hvac_mode_of(device) == HvacMode::Off {
        HvacAction::Off
    } else if device.is_heating() {
        HvacAction::Heating
    } else {
        // Target reached, unit standing by
        HvacAction::Idle
    }
}

fn preset_mode_of(device: &DeviceState) -> Result<PresetMode, HeaterError> {
    if device.target_temperature()? == BOOST_TEMPERATURE {
        Ok(PresetMode::Boost)
    } else {
        Ok(PresetMode::Normal)
    }
}

pub struct Heater {
    identity: DeviceIdentity,
    coordinator: Arc<HeaterCoordinator>,
    /// Target temperature before entering boost. Not persisted.
    last_temperature: Mutex<Option<f64>>,
    state_tx: watch::Sender<ClimateState>,
}

impl Heater {
    pub fn new(identity: DeviceIdentity, coordinator: Arc<HeaterCoordinator>) -> Self {
        let (state_tx, _) = watch::channel(ClimateState::new(&identity, None));

        Self {
            identity,
            coordinator,
            last_temperature: Mutex::new(None),
            state_tx,
        }
    }

    pub fn sn(&self) -> &str {
        &self.identity.sn
    }

    pub fn name(&self) -> &str {
        &self.identity.name
    }

    pub fn unique_id(&self) -> String {
        unique_id(&self.identity.sn)
    }

    fn api(&self) -> Arc<dyn HeaterApi> {
        self.coordinator.api()
    }

    async fn device(&self) -> Result<DeviceState, HeaterError> {
        self.coordinator
            .available_device(&self.identity.sn)
            .await
            .ok_or_else(|| HeaterError::Unavailable(self.identity.sn.clone()))
    }

    // ========================================================================
    // State
    // ========================================================================

    /// Last refresh succeeded and the heater was part of it
    pub async fn available(&self) -> bool {
        self.coordinator
            .available_device(&self.identity.sn)
            .await
            .is_some()
    }

    pub async fn hvac_mode(&self) -> Result<HvacMode, HeaterError> {
        Ok(hvac_mode_of(&self.device().await?))
    }

    pub async fn hvac_action(&self) -> Result<HvacAction, HeaterError> {
        Ok(hvac_action_of(&self.device().await?))
    }

    pub async fn current_temperature(&self) -> Result<f64, HeaterError> {
        self.device().await?.temperature()
    }

    pub async fn target_temperature(&self) -> Result<f64, HeaterError> {
        self.device().await?.target_temperature()
    }

    pub async fn preset_mode(&self) -> Result<PresetMode, HeaterError> {
        preset_mode_of(&self.device().await?)
    }

    pub async fn state(&self) -> ClimateState {
        let device = self.coordinator.available_device(&self.identity.sn).await;
        ClimateState::new(&self.identity, device.as_ref())
    }

    /// Publish the current state to subscribers
    pub async fn write_state(&self) {
        let state = self.state().await;
        self.state_tx.send_replace(state);
    }

    pub fn subscribe(&self) -> watch::Receiver<ClimateState> {
        self.state_tx.subscribe()
    }

    /// Republish state after every coordinator refresh.
    pub fn spawn_state_listener(self: Arc<Self>) -> JoinHandle<()> {
        let mut updates = self.coordinator.subscribe();
        tokio::spawn(async move {
            while updates.changed().await.is_ok() {
                self.write_state().await;
            }
        })
    }

    // ========================================================================
    // Commands
    // ========================================================================

    pub async fn set_hvac_mode(&self, mode: HvacMode) -> Result<(), HeaterError> {
        self.set_power(mode == HvacMode::Heat).await
    }

    pub async fn turn_on(&self) -> Result<(), HeaterError> {
        self.set_power(true).await
    }

    pub async fn turn_off(&self) -> Result<(), HeaterError> {
        self.set_power(false).await
    }

    pub async fn set_power(&self, on: bool) -> Result<(), HeaterError> {
        let sn = &self.identity.sn;
        tracing::info!(
            "[Heater] {} ({}) power {}",
            self.identity.name,
            sn,
            if on { "on" } else { "off" }
        );

        // Provisional value shown until the server answers.
        self.coordinator
            .mutate_device(sn, |device| device.set_closed(!on))
            .await;
        self.write_state().await;

        let confirmed = self
            .api()
            .set_power(sn, &self.identity.password, on)
            .await
            .map_err(|e| {
                tracing::warn!("[Heater] {} power command failed: {}", sn, e);
                e
            })?;

        self.coordinator
            .update_device(sn, DeviceState::from(confirmed))
            .await;
        self.write_state().await;
        Ok(())
    }

    pub async fn set_temperature(&self, temperature: f64) -> Result<(), HeaterError> {
        let sn = &self.identity.sn;
        tracing::info!(
            "[Heater] {} ({}) target temperature {}",
            self.identity.name,
            sn,
            temperature
        );

        let confirmed = self
            .api()
            .set_temperature(sn, &self.identity.password, temperature)
            .await?;
        self.coordinator
            .update_device(sn, DeviceState::from(confirmed))
            .await;
        self.write_state().await;

        // The single-device response may lack fields the batch poll carries.
        self.coordinator.request_refresh().await;
        Ok(())
    }

    pub async fn set_preset_mode(&self, preset: PresetMode) -> Result<(), HeaterError> {
        match preset {
            PresetMode::Boost => {
                let current = self
                    .coordinator
                    .device(&self.identity.sn)
                    .await
                    .and_then(|d| d.target_temperature().ok());
                if let Some(current) = current {
                    *self.last_temperature.lock().await = Some(current);
                }
                self.set_temperature(BOOST_TEMPERATURE).await
            }
            PresetMode::Normal => {
                let restore = self
                    .last_temperature
                    .lock()
                    .await
                    .take()
                    .unwrap_or(DEFAULT_RESTORE_TEMPERATURE);
                self.set_temperature(restore).await
            }
        }
    }

    /// Switch the device's own working mode (constant/smart/vacation)
    pub async fn set_operating_mode(&self, mode: DeviceMode) -> Result<(), HeaterError> {
        let sn = &self.identity.sn;
        tracing::info!("[Heater] {} ({}) mode {:?}", self.identity.name, sn, mode);

        let confirmed = self
            .api()
            .set_mode(sn, &self.identity.password, mode)
            .await?;
        self.coordinator
            .update_device(sn, DeviceState::from(confirmed))
            .await;
        self.write_state().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::youejia::coordinator::DEFAULT_UPDATE_INTERVAL;
    use crate::youejia::fake::FakeHeaterApi;
    use serde_json::json;
    use std::sync::atomic::Ordering;

    async fn setup(target: f64, closed: bool) -> (Arc<FakeHeaterApi>, Arc<HeaterCoordinator>, Heater) {
        let api = Arc::new(FakeHeaterApi::new());
        api.add_device("1001", target, closed);
        let coordinator = Arc::new(HeaterCoordinator::new(
            api.clone(),
            vec!["1001".to_string()],
            DEFAULT_UPDATE_INTERVAL,
        ));
        coordinator.first_refresh().await.unwrap();

        let heater = Heater::new(
            DeviceIdentity {
                name: "Living room".to_string(),
                sn: "1001".to_string(),
                password: "pw".to_string(),
            },
            coordinator.clone(),
        );
        (api, coordinator, heater)
    }

    #[tokio::test]
    async fn test_derived_state() {
        let (api, coordinator, heater) = setup(18.0, false).await;

        assert_eq!(heater.unique_id(), "1001_youejia_thermostat");
        assert!(heater.available().await);
        assert_eq!(heater.hvac_mode().await.unwrap(), HvacMode::Heat);
        assert_eq!(heater.hvac_action().await.unwrap(), HvacAction::Idle);
        assert_eq!(heater.current_temperature().await.unwrap(), 19.0);
        assert_eq!(heater.target_temperature().await.unwrap(), 18.0);
        assert_eq!(heater.preset_mode().await.unwrap(), PresetMode::Normal);

        api.set_field("1001", "is_heat", json!(true));
        coordinator.async_refresh().await.unwrap();
        assert_eq!(heater.hvac_action().await.unwrap(), HvacAction::Heating);

        api.set_field("1001", "k_close", json!(true));
        coordinator.async_refresh().await.unwrap();
        assert_eq!(heater.hvac_mode().await.unwrap(), HvacMode::Off);
        assert_eq!(heater.hvac_action().await.unwrap(), HvacAction::Off);
    }

    #[tokio::test]
    async fn test_boost_derived_from_target_temperature() {
        let (_api, _coordinator, heater) = setup(30.0, false).await;
        assert_eq!(heater.preset_mode().await.unwrap(), PresetMode::Boost);
    }

    #[tokio::test]
    async fn test_unparseable_temperature() {
        let (api, coordinator, heater) = setup(18.0, false).await;
        api.set_field("1001", "temp", json!("--"));
        coordinator.async_refresh().await.unwrap();

        assert!(matches!(
            heater.current_temperature().await,
            Err(HeaterError::Parse { field: "temp", .. })
        ));
        let state = heater.state().await;
        assert!(state.available);
        assert_eq!(state.current_temperature, None);
        assert_eq!(state.target_temperature, Some(18.0));
    }

    #[tokio::test]
    async fn test_unavailable_after_failed_poll() {
        let (api, coordinator, heater) = setup(18.0, false).await;
        api.fail_get_devices.store(true, Ordering::SeqCst);
        let _ = coordinator.async_refresh().await;

        assert!(!heater.available().await);
        assert!(matches!(
            heater.hvac_mode().await,
            Err(HeaterError::Unavailable(_))
        ));
        assert!(!heater.state().await.available);
    }

    #[tokio::test]
    async fn test_set_power_is_optimistic_then_confirmed() {
        let (api, coordinator, heater) = setup(18.0, true).await;
        let mut states = heater.subscribe();

        heater.set_hvac_mode(HvacMode::Heat).await.unwrap();

        assert_eq!(api.set_calls(), vec!["power:true"]);
        assert!(!coordinator.device("1001").await.unwrap().is_closed());
        assert_eq!(heater.hvac_mode().await.unwrap(), HvacMode::Heat);
        assert!(states.has_changed().unwrap());
        assert_eq!(states.borrow_and_update().hvac_mode, Some(HvacMode::Heat));
        // Power changes do not trigger an extra poll.
        assert_eq!(api.get_devices_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_power_state_published_before_command_returns() {
        let (api, coordinator, heater) = setup(18.0, true).await;
        let heater = Arc::new(heater);
        let mut states = heater.subscribe();
        api.hold_set.store(true, Ordering::SeqCst);

        let command = tokio::spawn({
            let heater = heater.clone();
            async move { heater.turn_on().await }
        });

        states.changed().await.unwrap();
        assert_eq!(states.borrow_and_update().hvac_mode, Some(HvacMode::Heat));
        assert!(!coordinator.device("1001").await.unwrap().is_closed());
        // The server has not applied the command yet.
        assert_eq!(api.server_device("1001").unwrap()["k_close"], json!(true));
        assert!(!command.is_finished());

        api.release_set();
        command.await.unwrap().unwrap();
        assert_eq!(api.server_device("1001").unwrap()["k_close"], json!(false));
        assert_eq!(heater.hvac_mode().await.unwrap(), HvacMode::Heat);
    }

    #[tokio::test]
    async fn test_failed_power_command_keeps_optimistic_value() {
        let (api, coordinator, heater) = setup(18.0, false).await;
        api.fail_set.store(true, Ordering::SeqCst);

        let err = heater.turn_off().await.unwrap_err();
        assert!(matches!(err, HeaterError::Api(_)));
        assert!(coordinator.device("1001").await.unwrap().is_closed());
        assert_eq!(heater.hvac_mode().await.unwrap(), HvacMode::Off);

        // The next successful poll reconciles with the server.
        api.fail_set.store(false, Ordering::SeqCst);
        coordinator.async_refresh().await.unwrap();
        assert_eq!(heater.hvac_mode().await.unwrap(), HvacMode::Heat);
    }

    #[tokio::test]
    async fn test_set_temperature_stores_response_and_refreshes() {
        let (api, coordinator, heater) = setup(18.0, false).await;

        heater.set_temperature(24.6).await.unwrap();

        assert_eq!(api.set_calls(), vec!["temperature:24"]);
        assert_eq!(heater.target_temperature().await.unwrap(), 24.0);
        assert_eq!(
            coordinator.device("1001").await.unwrap().get("temp_status"),
            Some(&json!(24))
        );
        assert_eq!(api.get_devices_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_preset_round_trip_restores_previous_target() {
        let (api, _coordinator, heater) = setup(18.0, false).await;

        heater.set_preset_mode(PresetMode::Boost).await.unwrap();
        assert_eq!(heater.target_temperature().await.unwrap(), 30.0);
        assert_eq!(heater.preset_mode().await.unwrap(), PresetMode::Boost);

        heater.set_preset_mode(PresetMode::Normal).await.unwrap();
        assert_eq!(heater.target_temperature().await.unwrap(), 18.0);
        assert_eq!(heater.preset_mode().await.unwrap(), PresetMode::Normal);
        assert_eq!(api.set_calls(), vec!["temperature:30", "temperature:18"]);
    }

    #[tokio::test]
    async fn test_normal_preset_falls_back_without_memory() {
        let (api, _coordinator, heater) = setup(30.0, false).await;

        heater.set_preset_mode(PresetMode::Normal).await.unwrap();
        assert_eq!(heater.target_temperature().await.unwrap(), 22.0);
        assert_eq!(api.set_calls(), vec!["temperature:22"]);
    }

    #[tokio::test]
    async fn test_remembered_temperature_is_cleared_after_restore() {
        let (api, _coordinator, heater) = setup(18.0, false).await;

        heater.set_preset_mode(PresetMode::Boost).await.unwrap();
        heater.set_preset_mode(PresetMode::Normal).await.unwrap();
        heater.set_preset_mode(PresetMode::Normal).await.unwrap();

        assert_eq!(
            api.set_calls(),
            vec!["temperature:30", "temperature:18", "temperature:22"]
        );
    }

    #[tokio::test]
    async fn test_set_operating_mode_stores_response() {
        let (api, _coordinator, heater) = setup(18.0, false).await;

        heater.set_operating_mode(DeviceMode::Vacation).await.unwrap();
        assert_eq!(api.set_calls(), vec!["mode:2"]);
        assert_eq!(heater.state().await.device_mode, Some(DeviceMode::Vacation));
    }

    #[tokio::test]
    async fn test_state_listener_republishes_on_refresh() {
        let (api, coordinator, heater) = setup(18.0, false).await;
        let heater = Arc::new(heater);
        let mut states = heater.subscribe();
        let listener = heater.clone().spawn_state_listener();

        api.set_field("1001", "temp_status", json!(25));
        coordinator.async_refresh().await.unwrap();

        states.changed().await.unwrap();
        assert_eq!(states.borrow().target_temperature, Some(25.0));
        listener.abort();
    }
}
