/*!
 * Security Violations
 * Immutable violation records and the notification channel that carries them
 */

use crate::core::serde::system_time_millis;
use crate::core::types::PluginId;
use crate::policy::RestrictionType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

/// Violation severity for filtering and quarantine decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Severity {
    Low = 0,
    Medium = 1,
    High = 2,
    Critical = 3,
}

impl Severity {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded, timestamped breach of policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityViolation {
    pub plugin_id: PluginId,
    #[serde(rename = "type")]
    pub restriction_type: RestrictionType,
    /// What was attempted, e.g. `domain_not_allowed`
    pub action: String,
    /// Structured context
    pub details: serde_json::Value,
    #[serde(with = "system_time_millis")]
    pub timestamp: SystemTime,
    pub severity: Severity,
}

impl SecurityViolation {
    pub fn new(
        plugin_id: impl Into<PluginId>,
        restriction_type: RestrictionType,
        action: impl Into<String>,
        details: serde_json::Value,
        severity: Severity,
    ) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            restriction_type,
            action: action.into(),
            details,
            timestamp: SystemTime::now(),
            severity,
        }
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: SystemTime) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Process-wide violation notification channel
///
/// Uses a tokio broadcast channel; every subscriber sees every violation
/// recorded after it subscribed.
#[derive(Clone)]
pub struct ViolationBroadcaster {
    sender: Arc<broadcast::Sender<SecurityViolation>>,
}

impl ViolationBroadcaster {
    /// Create new broadcaster with specified capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SecurityViolation> {
        self.sender.subscribe()
    }

    /// Subscribe as a `Stream`; lagged receivers yield an error item and continue
    pub fn stream(&self) -> BroadcastStream<SecurityViolation> {
        BroadcastStream::new(self.sender.subscribe())
    }

    pub fn emit(&self, violation: SecurityViolation) {
        // No subscribers is fine
        let _ = self.sender.send(violation);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ViolationBroadcaster {
    fn default() -> Self {
        Self::new(crate::core::limits::VIOLATION_CHANNEL_CAPACITY)
    }
}
