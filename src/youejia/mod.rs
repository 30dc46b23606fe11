//! YoueJia cloud integration module
//!
//! - `transport`: ubus envelope framing and pooled HTTP session
//! - `client`: Device commands and queries (`HeaterApi`)
//! - `coordinator`: Periodic batch polling and the shared device snapshot
//! - `discovery`: Onboarding lookup of the account's heaters

pub mod client;
pub mod coordinator;
pub mod discovery;
pub mod models;
pub mod transport;

#[cfg(test)]
pub(crate) mod fake;

pub use client::{HeaterApi, YoueJiaClient};
pub use coordinator::HeaterCoordinator;
pub use discovery::discover_heaters;
