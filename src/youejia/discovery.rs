//! Onboarding: find the heaters bound to an account

use super::client::HeaterApi;
use super::models::{DeviceSummary, UserInfo};
use crate::error::ApiError;

/// List the account's devices of the heater type. Other device types
/// bound to the same account are ignored.
pub async fn discover_heaters(api: &dyn HeaterApi) -> Result<Vec<DeviceSummary>, ApiError> {
    let info = UserInfo::from_payload(api.get_user_info().await?)?;

    let heaters: Vec<DeviceSummary> = info.heaters().cloned().collect();
    for heater in &heaters {
        tracing::info!(
            "[YoueJia] Found heater, name: {}, sn: {}",
            heater.nickname,
            heater.sn
        );
    }
    if heaters.is_empty() {
        tracing::warn!(
            "[YoueJia] No heaters among {} devices on this account",
            info.devices.len()
        );
    }

    Ok(heaters)
}
