//! Health reporting

use crate::cache::CacheStatus;
use crate::orchestrator::{CircuitSnapshot, CircuitState};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpstreamStatus {
    Available,
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallHealth {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: OverallHealth,
    pub store: ComponentStatus,
    pub cache: CacheStatus,
    pub upstream: UpstreamStatus,
    pub upstream_provider: String,
    pub circuit: CircuitSnapshot,
    pub version: &'static str,
    pub checked_at: DateTime<Utc>,
}

impl HealthReport {
    /// The store is the only hard dependency; anything else only degrades
    pub fn assess(
        store_ok: bool,
        cache: CacheStatus,
        upstream_ok: bool,
        upstream_provider: impl Into<String>,
        circuit: CircuitSnapshot,
    ) -> Self {
        let status = if !store_ok {
            OverallHealth::Unhealthy
        } else if cache == CacheStatus::Disconnected
            || !upstream_ok
            || circuit.state != CircuitState::Closed
        {
            OverallHealth::Degraded
        } else {
            OverallHealth::Healthy
        };

        Self {
            status,
            store: if store_ok {
                ComponentStatus::Connected
            } else {
                ComponentStatus::Disconnected
            },
            cache,
            upstream: if upstream_ok {
                UpstreamStatus::Available
            } else {
                UpstreamStatus::Unavailable
            },
            upstream_provider: upstream_provider.into(),
            circuit,
            version: env!("CARGO_PKG_VERSION"),
            checked_at: Utc::now(),
        }
    }
}
