//! Shared application state handed to the API handlers

use std::sync::Arc;
use std::time::Instant;

use crate::climate::Heater;
use crate::error::AppError;
use crate::youejia::{HeaterApi, HeaterCoordinator};

#[derive(Clone)]
pub struct AppState {
    pub api: Arc<dyn HeaterApi>,
    pub coordinator: Arc<HeaterCoordinator>,
    pub heaters: Arc<Vec<Arc<Heater>>>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(coordinator: Arc<HeaterCoordinator>, heaters: Vec<Arc<Heater>>) -> Self {
        Self {
            api: coordinator.api(),
            coordinator,
            heaters: Arc::new(heaters),
            start_time: Instant::now(),
        }
    }

    pub fn heater(&self, sn: &str) -> Result<Arc<Heater>, AppError> {
        self.heaters
            .iter()
            .find(|h| h.sn() == sn)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Heater {} not found", sn)))
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
