//! Liveness and readiness probes
//!
//! Liveness only reports that the process is serving. Readiness requires
//! both directory caches to have completed their initial sync, since a List
//! answered from an empty cache would hide every project.

use crate::registry::ProjectRegistry;
use serde::{Deserialize, Serialize};
use std::time::Instant;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Individual component health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    pub message: Option<String>,
}

/// Liveness probe response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessResponse {
    pub alive: bool,
    pub version: String,
    pub uptime_seconds: u64,
    pub timestamp: i64,
}

/// Readiness probe response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub reason: Option<String>,
    pub components: Vec<ComponentHealth>,
    pub timestamp: i64,
}

pub struct HealthChecker {
    start_time: Instant,
    version: String,
}

impl HealthChecker {
    pub fn new(version: &str) -> Self {
        Self {
            start_time: Instant::now(),
            version: version.to_string(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn liveness(&self) -> LivenessResponse {
        LivenessResponse {
            alive: true,
            version: self.version.clone(),
            uptime_seconds: self.uptime_seconds(),
            timestamp: chrono::Utc::now().timestamp(),
        }
    }

    /// Sync state of the registry's directories
    pub fn check_directories(&self, registry: &ProjectRegistry) -> Vec<ComponentHealth> {
        registry
            .sync_status()
            .iter()
            .map(|(name, synced)| ComponentHealth {
                name: name.to_string(),
                status: if *synced {
                    HealthStatus::Healthy
                } else {
                    HealthStatus::Unhealthy
                },
                message: Some(if *synced { "Synced" } else { "Waiting for initial sync" }.to_string()),
            })
            .collect()
    }

    /// Ready when every component is healthy
    pub fn readiness(&self, components: Vec<ComponentHealth>) -> ReadinessResponse {
        let pending: Vec<&str> = components
            .iter()
            .filter(|c| c.status != HealthStatus::Healthy)
            .map(|c| c.name.as_str())
            .collect();

        let reason = if pending.is_empty() {
            None
        } else {
            Some(format!("Not ready: {}", pending.join(", ")))
        };

        ReadinessResponse {
            ready: reason.is_none(),
            reason,
            components,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}
