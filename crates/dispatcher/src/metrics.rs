//! Metrics for group dispatch
//!
//! Handles are registered with the global `metrics` recorder. When no recorder
//! is installed every call is a no-op.

use metrics::{counter, gauge, histogram, Counter, Gauge, Histogram};

/// Dispatch metrics collector, labelled by group name
#[derive(Clone)]
pub struct DispatchMetrics {
    enabled: bool,
    dispatches_total: Counter,
    tasks_dispatched_total: Counter,
    member_failures_total: Counter,
    dynamic_picks_total: Counter,
    purged_members_total: Counter,
    dispatch_duration: Histogram,
    pool_size: Gauge,
}

impl DispatchMetrics {
    pub fn new(group: &str, enabled: bool) -> Self {
        let group = group.to_string();
        Self {
            enabled,
            dispatches_total: counter!("groupcall_dispatches_total", "group" => group.clone()),
            tasks_dispatched_total: counter!(
                "groupcall_tasks_dispatched_total",
                "group" => group.clone()
            ),
            member_failures_total: counter!(
                "groupcall_member_failures_total",
                "group" => group.clone()
            ),
            dynamic_picks_total: counter!(
                "groupcall_dynamic_picks_total",
                "group" => group.clone()
            ),
            purged_members_total: counter!(
                "groupcall_purged_members_total",
                "group" => group.clone()
            ),
            dispatch_duration: histogram!(
                "groupcall_dispatch_duration_seconds",
                "group" => group.clone()
            ),
            pool_size: gauge!("groupcall_pool_size", "group" => group),
        }
    }

    pub fn disabled() -> Self {
        Self::new("disabled", false)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record a completed dispatch
    pub fn record_dispatch(&self, task_count: usize, duration_seconds: f64) {
        if !self.enabled {
            return;
        }
        self.dispatches_total.increment(1);
        self.tasks_dispatched_total.increment(task_count as u64);
        self.dispatch_duration.record(duration_seconds);
    }

    pub fn record_member_failure(&self) {
        if self.enabled {
            self.member_failures_total.increment(1);
        }
    }

    pub fn record_dynamic_pick(&self) {
        if self.enabled {
            self.dynamic_picks_total.increment(1);
        }
    }

    pub fn record_purge(&self, removed: usize) {
        if self.enabled {
            self.purged_members_total.increment(removed as u64);
        }
    }

    pub fn update_pool_size(&self, size: usize) {
        if self.enabled {
            self.pool_size.set(size as f64);
        }
    }
}

impl std::fmt::Debug for DispatchMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchMetrics")
            .field("enabled", &self.enabled)
            .finish()
    }
}
