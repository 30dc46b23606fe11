//! HeaterCoordinator: periodic batch polling of all configured heaters
//!
//! Holds the device snapshot every climate entity reads from. A background
//! loop refreshes it every 30 seconds; entities may request extra refreshes,
//! which join the in-flight one instead of issuing a second fetch.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::{watch, Mutex, RwLock};
use tokio::time::{self, Instant, MissedTickBehavior};

use super::client::HeaterApi;
use super::models::{parse_device_batch, DeviceSnapshot, DeviceState};
use crate::error::RefreshError;

pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(30);

type SharedRefresh = Shared<BoxFuture<'static, Result<(), RefreshError>>>;

/// Published to listeners after every refresh attempt
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoordinatorUpdate {
    pub generation: u64,
    pub success: bool,
    pub last_error: Option<String>,
    pub last_update_success_time: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct CoordinatorState {
    snapshot: DeviceSnapshot,
    last_update_success: bool,
    last_error: Option<String>,
    last_update_success_time: Option<DateTime<Utc>>,
    generation: u64,
}

pub struct HeaterCoordinator {
    api: Arc<dyn HeaterApi>,
    serial_numbers: Vec<String>,
    update_interval: Duration,
    state: RwLock<CoordinatorState>,
    in_flight: Mutex<Option<SharedRefresh>>,
    updates: watch::Sender<CoordinatorUpdate>,
}

impl HeaterCoordinator {
    pub fn new(
        api: Arc<dyn HeaterApi>,
        serial_numbers: Vec<String>,
        update_interval: Duration,
    ) -> Self {
        let (updates, _) = watch::channel(CoordinatorUpdate::default());

        Self {
            api,
            serial_numbers,
            update_interval,
            state: RwLock::new(CoordinatorState::default()),
            in_flight: Mutex::new(None),
            updates,
        }
    }

    pub fn api(&self) -> Arc<dyn HeaterApi> {
        Arc::clone(&self.api)
    }

    pub fn serial_numbers(&self) -> &[String] {
        &self.serial_numbers
    }

    /// Initial fetch before any entity is created. Setup must not continue
    /// if this fails.
    pub async fn first_refresh(self: &Arc<Self>) -> Result<(), RefreshError> {
        self.async_refresh().await.map_err(|e| {
            tracing::error!("[Coordinator] Initial refresh failed: {}", e);
            e
        })
    }

    /// Refresh now, or join the refresh already in flight.
    pub async fn async_refresh(self: &Arc<Self>) -> Result<(), RefreshError> {
        let refresh = {
            let mut slot = self.in_flight.lock().await;
            match slot.as_ref() {
                Some(refresh) => {
                    tracing::debug!("[Coordinator] Joining in-flight refresh");
                    refresh.clone()
                }
                None => {
                    let this = Arc::clone(self);
                    // Spawned so the fetch completes even if every waiter is dropped.
                    let task = tokio::spawn(async move {
                        let fetch = tokio::spawn({
                            let this = Arc::clone(&this);
                            async move { this.fetch_and_publish().await }
                        });
                        let outcome = match fetch.await {
                            Ok(outcome) => outcome,
                            Err(e) => {
                                tracing::error!("[Coordinator] Refresh task failed: {}", e);
                                let err = RefreshError::Aborted(e.to_string());
                                this.publish(Err(err.clone())).await;
                                Err(err)
                            }
                        };
                        // Cleared on every exit path so the next request fetches again.
                        this.in_flight.lock().await.take();
                        outcome
                    });
                    let refresh = async move {
                        task.await
                            .unwrap_or_else(|e| Err(RefreshError::Aborted(e.to_string())))
                    }
                    .boxed()
                    .shared();
                    *slot = Some(refresh.clone());
                    refresh
                }
            }
        };

        refresh.await
    }

    /// Out-of-band refresh requested by an entity. Failures are reported
    /// through the coordinator state, not to the caller.
    pub async fn request_refresh(self: &Arc<Self>) {
        if let Err(e) = self.async_refresh().await {
            tracing::debug!("[Coordinator] Requested refresh failed: {}", e);
        }
    }

    async fn fetch_and_publish(&self) -> Result<(), RefreshError> {
        let fetched = self
            .api
            .get_devices(&self.serial_numbers)
            .await
            .and_then(parse_device_batch)
            .map_err(|e| RefreshError::Api(e.to_string()));

        self.publish(fetched).await
    }

    /// Record a refresh outcome and notify listeners.
    async fn publish(
        &self,
        fetched: Result<DeviceSnapshot, RefreshError>,
    ) -> Result<(), RefreshError> {
        let mut state = self.state.write().await;
        state.generation += 1;

        let outcome = match fetched {
            Ok(snapshot) => {
                for sn in &self.serial_numbers {
                    if !snapshot.contains_key(sn) {
                        tracing::debug!("[Coordinator] Heater {} missing from batch response", sn);
                    }
                }
                if !state.last_update_success && state.generation > 1 {
                    tracing::info!("[Coordinator] Fetching heater data recovered");
                }

                state.snapshot = snapshot;
                state.last_update_success = true;
                state.last_error = None;
                state.last_update_success_time = Some(Utc::now());
                Ok(())
            }
            Err(e) => {
                tracing::warn!("[Coordinator] Error fetching heater data: {}", e);
                state.last_update_success = false;
                state.last_error = Some(e.to_string());
                Err(e)
            }
        };

        let update = CoordinatorUpdate {
            generation: state.generation,
            success: state.last_update_success,
            last_error: state.last_error.clone(),
            last_update_success_time: state.last_update_success_time,
        };
        drop(state);

        self.updates.send_replace(update);
        outcome
    }

    /// Start the periodic polling loop (runs forever). The first tick is one
    /// interval away; `first_refresh` covers startup.
    pub async fn start(self: Arc<Self>) {
        tracing::info!(
            "[Coordinator] Starting polling for {} heaters (interval: {}s)",
            self.serial_numbers.len(),
            self.update_interval.as_secs()
        );

        let mut timer = time::interval_at(Instant::now() + self.update_interval, self.update_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            timer.tick().await;
            // Failures are already logged and published to listeners.
            let _ = self.async_refresh().await;
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<CoordinatorUpdate> {
        self.updates.subscribe()
    }

    pub async fn last_update_success(&self) -> bool {
        self.state.read().await.last_update_success
    }

    pub async fn last_update_success_time(&self) -> Option<DateTime<Utc>> {
        self.state.read().await.last_update_success_time
    }

    pub async fn last_error(&self) -> Option<String> {
        self.state.read().await.last_error.clone()
    }

    pub async fn snapshot(&self) -> DeviceSnapshot {
        self.state.read().await.snapshot.clone()
    }

    /// Snapshot entry regardless of whether the last refresh succeeded
    pub async fn device(&self, sn: &str) -> Option<DeviceState> {
        self.state.read().await.snapshot.get(sn).cloned()
    }

    /// Snapshot entry, or `None` while the coordinator is failed
    pub async fn available_device(&self, sn: &str) -> Option<DeviceState> {
        let state = self.state.read().await;
        if !state.last_update_success {
            return None;
        }
        state.snapshot.get(sn).cloned()
    }

    /// Replace one heater's entry with a server-confirmed state.
    pub async fn update_device(&self, sn: &str, device: DeviceState) {
        self.state
            .write()
            .await
            .snapshot
            .insert(sn.to_string(), device);
    }

    /// Apply a provisional change to one heater's entry. Returns false if the
    /// heater is not in the snapshot.
    pub async fn mutate_device<F>(&self, sn: &str, apply: F) -> bool
    where
        F: FnOnce(&mut DeviceState),
    {
        match self.state.write().await.snapshot.get_mut(sn) {
            Some(device) => {
                apply(device);
                true
            }
            None => false,
        }
    }
}
