//! Application state management for the exporter.
//!
//! This module defines the shared application state that is passed
//! to HTTP handlers.

use prometheus::{Gauge, Registry};
use std::sync::Arc;

use crate::config::Config;
use crate::health_stats::HealthStats;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// Global application state shared across requests.
pub struct AppState {
    /// Registry owning the CPU sampler collector; every gather() against it
    /// runs one sampling cycle.
    pub registry: Registry,
    /// Duration of the previous scrape; exported on the following one.
    pub scrape_duration: Gauge,
    pub config: Arc<Config>,
    pub health_stats: Arc<HealthStats>,
}
