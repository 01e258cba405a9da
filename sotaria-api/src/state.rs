//! Application State
//!
//! Shared state for the Sotaria apiserver

use crate::config::SotariaConfig;
use crate::health::HealthChecker;
use crate::registry::ProjectRegistry;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<SotariaConfig>,
    pub registry: Arc<ProjectRegistry>,
    pub health: Arc<HealthChecker>,
}

impl AppState {
    pub fn new(config: SotariaConfig, registry: ProjectRegistry) -> Self {
        Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
            health: Arc::new(HealthChecker::new(env!("CARGO_PKG_VERSION"))),
        }
    }
}
