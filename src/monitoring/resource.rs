/*!
 * Resource Monitor
 * Per-plugin usage accounting against limits, plus the violation log
 *
 * Each plugin's usage record sits behind its own mutex; the map only hands
 * out `Arc` handles, so two plugins never contend on the same lock.
 */

use super::violations::{SecurityViolation, Severity, ViolationBroadcaster};
use crate::core::limits::{BYTES_PER_MB, NETWORK_WINDOW, VIOLATION_CHANNEL_CAPACITY};
use crate::core::serde::system_time_millis;
use crate::core::types::{elapsed_between, Clock, PluginId, SystemClock};
use crate::policy::{ResourceLimits, RestrictionType};
use ahash::RandomState;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

/// Live usage counters for one plugin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceUsage {
    /// High-water mark in MB
    pub memory: f64,
    /// MB
    pub storage: f64,
    /// Percent
    pub cpu: f64,
    /// Requests in the current window
    pub network_requests: u32,
    pub file_operations: u32,
    /// Cumulative seconds
    pub execution_time: f64,
    #[serde(with = "system_time_millis")]
    pub start_time: SystemTime,
    /// Start of the current network window
    #[serde(with = "system_time_millis")]
    pub network_requests_reset: SystemTime,
}

impl ResourceUsage {
    fn fresh(now: SystemTime) -> Self {
        Self {
            memory: 0.0,
            storage: 0.0,
            cpu: 0.0,
            network_requests: 0,
            file_operations: 0,
            execution_time: 0.0,
            start_time: now,
            network_requests_reset: now,
        }
    }
}

struct UsageEntry {
    limits: ResourceLimits,
    usage: ResourceUsage,
}

/// Monitor statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorStats {
    pub tracked_plugins: usize,
    pub total_violations: usize,
    pub low: usize,
    pub medium: usize,
    pub high: usize,
    pub critical: usize,
}

/// Tracks per-plugin usage and owns the append-only violation log
///
/// Limits, usage records and the log are only written from inside the
/// crate; hosts reach them through `SecurityContext`.
///
/// ```compile_fail
/// use plugin_sandbox::SecurityContext;
///
/// fn drop_usage(context: &SecurityContext) {
///     context.monitor().remove_plugin("p");
/// }
/// ```
pub struct ResourceMonitor {
    entries: DashMap<PluginId, Arc<Mutex<UsageEntry>>, RandomState>,
    violations: RwLock<Vec<SecurityViolation>>,
    broadcaster: ViolationBroadcaster,
    clock: Arc<dyn Clock>,
    window: Duration,
}

impl ResourceMonitor {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self::with_options(clock, NETWORK_WINDOW, VIOLATION_CHANNEL_CAPACITY)
    }

    pub fn with_options(clock: Arc<dyn Clock>, window: Duration, channel_capacity: usize) -> Self {
        Self {
            entries: DashMap::with_hasher(RandomState::new()),
            violations: RwLock::new(Vec::new()),
            broadcaster: ViolationBroadcaster::new(channel_capacity),
            clock,
            window,
        }
    }

    #[inline]
    pub fn now(&self) -> SystemTime {
        self.clock.now()
    }

    fn entry(&self, plugin_id: &str) -> Option<Arc<Mutex<UsageEntry>>> {
        self.entries.get(plugin_id).map(|e| Arc::clone(e.value()))
    }

    /// Usage record for a gated consumption; a missing record denies
    fn tracked_entry(&self, plugin_id: &str) -> Result<Arc<Mutex<UsageEntry>>, SecurityViolation> {
        self.entry(plugin_id).ok_or_else(|| {
            self.record(
                plugin_id,
                RestrictionType::ApiAccess,
                "usage_untracked",
                json!({}),
                Severity::High,
            )
        })
    }

    /// Install limits and start a zeroed usage record
    pub(crate) fn set_limits(&self, plugin_id: &str, limits: ResourceLimits) {
        let entry = UsageEntry {
            limits,
            usage: ResourceUsage::fresh(self.now()),
        };
        self.entries
            .insert(plugin_id.to_string(), Arc::new(Mutex::new(entry)));
        debug!(plugin_id, ?limits, "Resource limits installed");
    }

    /// Drop limits and usage; recorded violations are kept
    pub(crate) fn remove_plugin(&self, plugin_id: &str) -> bool {
        self.entries.remove(plugin_id).is_some()
    }

    pub fn get_limits(&self, plugin_id: &str) -> Option<ResourceLimits> {
        self.entry(plugin_id).map(|e| e.lock().limits)
    }

    /// Update the memory high-water mark; overage is reported, never blocked
    pub fn track_memory_usage(&self, plugin_id: &str, bytes: u64) {
        let Some(entry) = self.entry(plugin_id) else {
            return;
        };

        let exceeded = {
            let mut entry = entry.lock();
            let megabytes = bytes as f64 / BYTES_PER_MB;
            entry.usage.memory = entry.usage.memory.max(megabytes);
            (entry.usage.memory > entry.limits.memory as f64)
                .then(|| (entry.usage.memory, entry.limits.memory))
        };

        if let Some((usage_mb, limit_mb)) = exceeded {
            self.record(
                plugin_id,
                RestrictionType::ApiAccess,
                "memory_exceeded",
                json!({ "usage": usage_mb, "limit": limit_mb }),
                Severity::High,
            );
        }
    }

    /// Count one request in the rolling window; `false` blocks the request
    ///
    /// A plugin without a usage record is blocked.
    pub fn track_network_request(&self, plugin_id: &str) -> bool {
        self.consume_network_request(plugin_id).is_ok()
    }

    /// Windowed request accounting returning the violation recorded on overage
    pub(crate) fn consume_network_request(
        &self,
        plugin_id: &str,
    ) -> Result<(), SecurityViolation> {
        let entry = self.tracked_entry(plugin_id)?;
        let now = self.now();

        let exceeded = {
            let mut entry = entry.lock();
            if elapsed_between(entry.usage.network_requests_reset, now) > self.window {
                entry.usage.network_requests = 0;
                entry.usage.network_requests_reset = now;
            }
            entry.usage.network_requests += 1;
            (entry.usage.network_requests > entry.limits.network_requests)
                .then(|| (entry.usage.network_requests, entry.limits.network_requests))
        };

        match exceeded {
            Some((count, limit)) => Err(self.record(
                plugin_id,
                RestrictionType::NetworkAccess,
                "rate_limit_exceeded",
                json!({ "requests": count, "limit": limit, "windowSecs": self.window.as_secs() }),
                Severity::Medium,
            )),
            None => Ok(()),
        }
    }

    /// Accumulate execution time; `false` when this single call exceeded the budget
    ///
    /// Only the latest call is compared against the limit; the cumulative
    /// total is tracked for reporting.
    pub fn track_execution_time(&self, plugin_id: &str, elapsed: Duration) -> bool {
        self.consume_execution_time(plugin_id, elapsed).is_ok()
    }

    pub(crate) fn consume_execution_time(
        &self,
        plugin_id: &str,
        elapsed: Duration,
    ) -> Result<(), SecurityViolation> {
        let entry = self.tracked_entry(plugin_id)?;
        let seconds = elapsed.as_secs_f64();

        let exceeded = {
            let mut entry = entry.lock();
            entry.usage.execution_time += seconds;
            (seconds > entry.limits.execution_time as f64)
                .then(|| (entry.limits.execution_time, entry.usage.execution_time))
        };

        match exceeded {
            Some((limit, total)) => Err(self.record(
                plugin_id,
                RestrictionType::ApiAccess,
                "execution_time_exceeded",
                json!({ "elapsed": seconds, "limit": limit, "total": total }),
                Severity::High,
            )),
            None => Ok(()),
        }
    }

    /// Snapshot of a plugin's usage
    pub fn get_usage(&self, plugin_id: &str) -> Option<ResourceUsage> {
        self.entry(plugin_id).map(|e| e.lock().usage.clone())
    }

    /// Violations in insertion order, optionally for a single plugin
    pub fn get_violations(&self, plugin_id: Option<&str>) -> Vec<SecurityViolation> {
        let violations = self.violations.read();
        match plugin_id {
            Some(id) => violations
                .iter()
                .filter(|v| v.plugin_id == id)
                .cloned()
                .collect(),
            None => violations.clone(),
        }
    }

    /// Number of violations at or above `min_severity` for a plugin
    ///
    /// A network or storage call blocked by a `SandboxedApi` is logged twice:
    /// once by the failing rule and once by the gate, whose record carries
    /// `"gate": true` in its details. Both are counted here.
    pub fn violation_count(&self, plugin_id: &str, min_severity: Severity) -> usize {
        self.violations
            .read()
            .iter()
            .filter(|v| v.plugin_id == plugin_id && v.severity >= min_severity)
            .count()
    }

    /// Append a violation to the log and notify subscribers
    pub(crate) fn record_violation(&self, violation: SecurityViolation) {
        warn!(
            plugin_id = %violation.plugin_id,
            restriction = %violation.restriction_type,
            action = %violation.action,
            severity = %violation.severity,
            details = %violation.details,
            "Security violation recorded"
        );
        self.violations.write().push(violation.clone());
        self.broadcaster.emit(violation);
    }

    /// Build, timestamp and record a violation; returns the stored record
    pub(crate) fn record(
        &self,
        plugin_id: &str,
        restriction_type: RestrictionType,
        action: &str,
        details: serde_json::Value,
        severity: Severity,
    ) -> SecurityViolation {
        let violation =
            SecurityViolation::new(plugin_id, restriction_type, action, details, severity)
                .with_timestamp(self.now());
        self.record_violation(violation.clone());
        violation
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SecurityViolation> {
        self.broadcaster.subscribe()
    }

    pub fn violation_stream(&self) -> BroadcastStream<SecurityViolation> {
        self.broadcaster.stream()
    }

    pub fn stats(&self) -> MonitorStats {
        let violations = self.violations.read();
        let mut stats = MonitorStats {
            tracked_plugins: self.entries.len(),
            total_violations: violations.len(),
            ..MonitorStats::default()
        };
        for v in violations.iter() {
            match v.severity {
                Severity::Low => stats.low += 1,
                Severity::Medium => stats.medium += 1,
                Severity::High => stats.high += 1,
                Severity::Critical => stats.critical += 1,
            }
        }
        stats
    }
}

impl Default for ResourceMonitor {
    fn default() -> Self {
        Self::new()
    }
}
