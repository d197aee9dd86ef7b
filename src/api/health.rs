//! Aggregate health for the /health endpoint, derived from panel snapshots.

use serde::Serialize;

use crate::panel::PanelSnapshot;

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub uptime_secs: u64,
    pub panels: usize,
    pub panels_enabled: usize,
    pub panels_failing: usize,
    /// Polls currently awaiting an upstream reply, across all panels.
    pub in_flight: u32,
    /// Unix nanoseconds of the most recent successful poll of any panel.
    pub last_success_ns: Option<u64>,
}

impl HealthReport {
    pub fn from_snapshots(snapshots: &[PanelSnapshot], uptime_secs: u64) -> Self {
        let enabled: Vec<&PanelSnapshot> = snapshots.iter().filter(|s| s.enabled).collect();
        // Degraded once every enabled panel is failing.
        let degraded = !enabled.is_empty() && enabled.iter().all(|s| s.error.is_some());
        Self {
            status: if degraded { "degraded" } else { "ok" },
            uptime_secs,
            panels: snapshots.len(),
            panels_enabled: enabled.len(),
            panels_failing: snapshots.iter().filter(|s| s.error.is_some()).count(),
            in_flight: snapshots.iter().map(|s| s.in_flight).sum(),
            last_success_ns: snapshots.iter().filter_map(|s| s.updated_at_ns).max(),
        }
    }
}
