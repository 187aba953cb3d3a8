/*!
 * Configuration
 * Sandbox settings from the environment and policy files from disk
 *
 * Environment variables:
 * - SANDBOX_VIOLATION_CAPACITY: violation channel buffer (default: 1024)
 * - SANDBOX_NETWORK_WINDOW_SECS: rolling request window (default: 60)
 * - SANDBOX_TRACE_JSON: JSON log output (default: false)
 */

use crate::core::errors::{SandboxError, SandboxResult};
use crate::core::limits::{NETWORK_WINDOW, VIOLATION_CHANNEL_CAPACITY};
use crate::core::types::SystemClock;
use crate::monitoring::{init_tracing_with, ResourceMonitor};
use crate::policy::SecurityPolicy;
use crate::security::SecurityContext;
use anyhow::Context;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub const ENV_VIOLATION_CAPACITY: &str = "SANDBOX_VIOLATION_CAPACITY";
pub const ENV_NETWORK_WINDOW_SECS: &str = "SANDBOX_NETWORK_WINDOW_SECS";
pub const ENV_TRACE_JSON: &str = "SANDBOX_TRACE_JSON";

/// Process-level sandbox settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxSettings {
    pub violation_capacity: usize,
    pub network_window: Duration,
    pub trace_json: bool,
}

impl Default for SandboxSettings {
    fn default() -> Self {
        Self {
            violation_capacity: VIOLATION_CHANNEL_CAPACITY,
            network_window: NETWORK_WINDOW,
            trace_json: false,
        }
    }
}

impl SandboxSettings {
    /// Defaults overridden by whichever variables are set
    pub fn from_env() -> SandboxResult<Self> {
        let mut settings = Self::default();

        if let Some(capacity) = parse_var::<usize>(ENV_VIOLATION_CAPACITY)? {
            if capacity == 0 {
                return Err(SandboxError::Config(format!(
                    "{} must be greater than zero",
                    ENV_VIOLATION_CAPACITY
                )));
            }
            settings.violation_capacity = capacity;
        }
        if let Some(secs) = parse_var::<u64>(ENV_NETWORK_WINDOW_SECS)? {
            if secs == 0 {
                return Err(SandboxError::Config(format!(
                    "{} must be greater than zero",
                    ENV_NETWORK_WINDOW_SECS
                )));
            }
            settings.network_window = Duration::from_secs(secs);
        }
        if let Ok(value) = std::env::var(ENV_TRACE_JSON) {
            settings.trace_json = value == "1" || value.eq_ignore_ascii_case("true");
        }

        Ok(settings)
    }

    /// Install the global tracing subscriber with these settings
    pub fn init_tracing(&self) {
        init_tracing_with(self.trace_json);
    }

    pub fn build_monitor(&self) -> ResourceMonitor {
        ResourceMonitor::with_options(
            Arc::new(SystemClock),
            self.network_window,
            self.violation_capacity,
        )
    }

    pub fn build_context(&self) -> SecurityContext {
        SecurityContext::with_monitor(self.build_monitor())
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> SandboxResult<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| SandboxError::Config(format!("{} has invalid value '{}'", name, raw))),
        Err(_) => Ok(None),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PolicyFile {
    Many(Vec<SecurityPolicy>),
    One(Box<SecurityPolicy>),
}

/// Read a JSON file holding one policy or an array of policies
///
/// Every policy is validated before any is returned.
pub fn load_policies(path: impl AsRef<Path>) -> anyhow::Result<Vec<SecurityPolicy>> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read policy file {}", path.display()))?;
    let parsed: PolicyFile = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse policy file {}", path.display()))?;

    let policies = match parsed {
        PolicyFile::Many(policies) => policies,
        PolicyFile::One(policy) => vec![*policy],
    };
    for policy in &policies {
        policy
            .validate()
            .with_context(|| format!("invalid policy in {}", path.display()))?;
    }

    log::info!("Loaded {} policies from {}", policies.len(), path.display());
    Ok(policies)
}

/// Register every policy under its own id
pub fn register_policies(
    context: &SecurityContext,
    policies: Vec<SecurityPolicy>,
) -> SandboxResult<usize> {
    let count = policies.len();
    for policy in policies {
        let id = policy.id.clone();
        context.register_plugin(&id, policy)?;
    }
    Ok(count)
}
