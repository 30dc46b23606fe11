//! Climate platform: one `Heater` entity per configured device

pub mod heater;

use std::sync::Arc;

pub use heater::{ClimateState, Heater, HvacAction, HvacMode, PresetMode};

use crate::config::DeviceIdentity;
use crate::youejia::HeaterCoordinator;

/// Create the heater entities and start republishing their state on every
/// coordinator refresh.
pub async fn setup_heaters(
    devices: &[DeviceIdentity],
    coordinator: &Arc<HeaterCoordinator>,
) -> Vec<Arc<Heater>> {
    let mut heaters = Vec::with_capacity(devices.len());

    for identity in devices {
        let heater = Arc::new(Heater::new(identity.clone(), coordinator.clone()));
        heater.write_state().await;
        heater.clone().spawn_state_listener();

        tracing::info!(
            "[Heater] Added {} ({}) as {}",
            heater.name(),
            heater.sn(),
            heater.unique_id()
        );
        heaters.push(heater);
    }

    heaters
}
