/*!
 * Security Context
 * Policy registry and every policy-evaluation predicate
 */

use super::network::{find_matching_domain, resolve_port};
use super::storage::{key_has_allowed_prefix, serialized_len, StorageOperation};
use super::traits::{PluginRegistry, PolicyEvaluator, UsageReporter};
use crate::core::errors::{DenialKind, SandboxError, SandboxResult};
use crate::core::types::PluginId;
use crate::monitoring::{MonitorStats, ResourceMonitor, ResourceUsage, SecurityViolation, Severity};
use crate::policy::{RestrictionAction, RestrictionType, SecurityPolicy};
use ahash::RandomState;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use url::Url;

/// Context statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextStats {
    pub registered_plugins: usize,
    pub monitor: MonitorStats,
}

/// Owns the policy registry and the resource monitor
///
/// Share it between plugin hosts and sandboxed APIs through an `Arc`.
/// A plugin's policy and its usage record are installed and dropped while
/// the registry entry is held, so the two never disagree.
pub struct SecurityContext {
    policies: DashMap<PluginId, Arc<SecurityPolicy>, RandomState>,
    monitor: ResourceMonitor,
}

impl SecurityContext {
    pub fn new() -> Self {
        Self::with_monitor(ResourceMonitor::new())
    }

    pub fn with_monitor(monitor: ResourceMonitor) -> Self {
        info!("Security context initialized");
        Self {
            policies: DashMap::with_hasher(RandomState::new()),
            monitor,
        }
    }

    #[inline]
    pub fn monitor(&self) -> &ResourceMonitor {
        &self.monitor
    }

    /// Install a policy and reset the plugin's usage counters
    pub fn register_plugin(&self, plugin_id: &str, policy: SecurityPolicy) -> SandboxResult<()> {
        policy.validate()?;
        if policy.id != plugin_id {
            warn!(
                "Registering plugin '{}' with policy '{}' issued for another id",
                plugin_id, policy.id
            );
        }

        let limits = policy.resources;
        let entry = self.policies.entry(plugin_id.to_string());
        let replaced = matches!(entry, Entry::Occupied(_));
        self.monitor.set_limits(plugin_id, limits);
        entry.insert(Arc::new(policy));

        if replaced {
            info!("Replaced policy for plugin '{}', usage reset", plugin_id);
        } else {
            info!("Registered plugin '{}'", plugin_id);
        }
        Ok(())
    }

    /// Drop the plugin's policy and usage record; the audit trail stays
    pub fn unregister_plugin(&self, plugin_id: &str) -> bool {
        let entry = self.policies.entry(plugin_id.to_string());
        self.monitor.remove_plugin(plugin_id);
        let removed = match entry {
            Entry::Occupied(entry) => {
                entry.remove();
                true
            }
            Entry::Vacant(_) => false,
        };
        if removed {
            info!("Unregistered plugin '{}'", plugin_id);
        }
        removed
    }

    pub fn is_registered(&self, plugin_id: &str) -> bool {
        self.policies.contains_key(plugin_id)
    }

    pub fn get_policy(&self, plugin_id: &str) -> Option<Arc<SecurityPolicy>> {
        self.policies.get(plugin_id).map(|p| Arc::clone(p.value()))
    }

    pub fn registered_plugins(&self) -> Vec<PluginId> {
        self.policies.iter().map(|e| e.key().clone()).collect()
    }

    /// Permission is in the plugin's allow-list; `false` when unregistered
    pub fn check_permission(&self, plugin_id: &str, permission: &str) -> bool {
        match self.policies.get(plugin_id) {
            Some(policy) => {
                let allowed = policy.has_permission(permission);
                if !allowed {
                    debug!("Plugin '{}' lacks permission {}", plugin_id, permission);
                }
                allowed
            }
            None => {
                debug!("No policy found for plugin '{}'", plugin_id);
                false
            }
        }
    }

    /// First matching restriction decides; no match allows
    pub fn check_restriction(
        &self,
        plugin_id: &str,
        restriction_type: RestrictionType,
        target: &str,
    ) -> bool {
        let Some(policy) = self.get_policy(plugin_id) else {
            return false;
        };
        match policy.find_restriction(restriction_type, target) {
            Some(restriction) => restriction.action == RestrictionAction::Allow,
            None => true,
        }
    }

    /// Check a permission, recording a high-severity violation on failure
    pub fn require_permission(
        &self,
        plugin_id: &str,
        permission: &str,
        operation: &str,
    ) -> SandboxResult<()> {
        if self.check_permission(plugin_id, permission) {
            return Ok(());
        }
        Err(self.deny(
            DenialKind::PermissionDenied,
            plugin_id,
            RestrictionType::ApiAccess,
            "permission_denied",
            json!({ "permission": permission, "operation": operation }),
            Severity::High,
        ))
    }

    pub fn validate_network_request(&self, plugin_id: &str, url: &str) -> bool {
        self.evaluate_network_request(plugin_id, url).is_ok()
    }

    /// Network gate; the error carries the violation that was recorded
    ///
    /// Checks short-circuit in order: rate window, URL syntax, https
    /// requirement, allowed domains, blocked domains, ports.
    pub fn evaluate_network_request(&self, plugin_id: &str, url: &str) -> SandboxResult<()> {
        let policy = self
            .get_policy(plugin_id)
            .ok_or_else(|| SandboxError::PluginNotRegistered(plugin_id.to_string()))?;

        self.monitor
            .consume_network_request(plugin_id)
            .map_err(|v| SandboxError::denied(DenialKind::ResourceExceeded, v))?;

        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(e) => {
                return Err(self.deny(
                    DenialKind::InvalidInput,
                    plugin_id,
                    RestrictionType::NetworkAccess,
                    "invalid_url",
                    json!({ "url": url, "error": e.to_string() }),
                    Severity::Medium,
                ))
            }
        };

        let network = &policy.network;
        if network.require_https && parsed.scheme() != "https" {
            return Err(self.deny_network(
                plugin_id,
                "https_required",
                json!({ "url": url, "protocol": format!("{}:", parsed.scheme()) }),
            ));
        }

        let hostname = parsed.host_str().unwrap_or_default();
        if !network.allowed_domains.is_empty()
            && find_matching_domain(hostname, &network.allowed_domains).is_none()
        {
            return Err(self.deny_network(
                plugin_id,
                "domain_not_allowed",
                json!({ "url": url, "hostname": hostname, "allowedDomains": network.allowed_domains }),
            ));
        }

        if let Some(domain) = find_matching_domain(hostname, &network.blocked_domains) {
            return Err(self.deny_network(
                plugin_id,
                "domain_blocked",
                json!({ "url": url, "hostname": hostname, "blockedDomain": domain }),
            ));
        }

        let port = resolve_port(&parsed);
        if !network.allowed_ports.is_empty() && !network.allowed_ports.contains(&port) {
            return Err(self.deny_network(
                plugin_id,
                "port_not_allowed",
                json!({ "url": url, "port": port, "allowedPorts": network.allowed_ports }),
            ));
        }
        if network.blocked_ports.contains(&port) {
            return Err(self.deny_network(
                plugin_id,
                "port_blocked",
                json!({ "url": url, "port": port }),
            ));
        }

        Ok(())
    }

    pub fn validate_storage_operation(
        &self,
        plugin_id: &str,
        operation: StorageOperation,
        key: &str,
        value: Option<&serde_json::Value>,
    ) -> bool {
        self.evaluate_storage_operation(plugin_id, operation, key, value)
            .is_ok()
    }

    /// Storage gate; the error carries the violation that was recorded
    pub fn evaluate_storage_operation(
        &self,
        plugin_id: &str,
        operation: StorageOperation,
        key: &str,
        value: Option<&serde_json::Value>,
    ) -> SandboxResult<()> {
        let policy = self
            .get_policy(plugin_id)
            .ok_or_else(|| SandboxError::PluginNotRegistered(plugin_id.to_string()))?;
        let storage = &policy.storage;

        if !key_has_allowed_prefix(key, &storage.allowed_prefixes) {
            return Err(self.deny_storage(
                plugin_id,
                "key_prefix_not_allowed",
                json!({ "operation": operation, "key": key, "allowedPrefixes": storage.allowed_prefixes }),
            ));
        }

        if key.len() > storage.max_key_size {
            return Err(self.deny_storage(
                plugin_id,
                "key_too_large",
                json!({ "operation": operation, "key": key, "size": key.len(), "maxKeySize": storage.max_key_size }),
            ));
        }

        if operation == StorageOperation::Set {
            if let Some(value) = value {
                let size = serialized_len(value);
                if size > storage.max_value_size {
                    return Err(self.deny_storage(
                        plugin_id,
                        "value_too_large",
                        json!({ "operation": operation, "key": key, "size": size, "maxValueSize": storage.max_value_size }),
                    ));
                }
            }
        }

        Ok(())
    }

    pub fn get_usage(&self, plugin_id: &str) -> Option<ResourceUsage> {
        self.monitor.get_usage(plugin_id)
    }

    pub fn get_violations(&self, plugin_id: Option<&str>) -> Vec<SecurityViolation> {
        self.monitor.get_violations(plugin_id)
    }

    pub fn stats(&self) -> ContextStats {
        ContextStats {
            registered_plugins: self.policies.len(),
            monitor: self.monitor.stats(),
        }
    }

    /// Record a violation and wrap it in the matching error
    pub(crate) fn deny(
        &self,
        kind: DenialKind,
        plugin_id: &str,
        restriction_type: RestrictionType,
        action: &str,
        details: serde_json::Value,
        severity: Severity,
    ) -> SandboxError {
        let violation = self
            .monitor
            .record(plugin_id, restriction_type, action, details, severity);
        SandboxError::denied(kind, violation)
    }

    fn deny_network(&self, plugin_id: &str, action: &str, details: serde_json::Value) -> SandboxError {
        self.deny(
            DenialKind::PolicyViolation,
            plugin_id,
            RestrictionType::NetworkAccess,
            action,
            details,
            Severity::Medium,
        )
    }

    fn deny_storage(&self, plugin_id: &str, action: &str, details: serde_json::Value) -> SandboxError {
        self.deny(
            DenialKind::PolicyViolation,
            plugin_id,
            RestrictionType::StorageAccess,
            action,
            details,
            Severity::Medium,
        )
    }
}

impl Default for SecurityContext {
    fn default() -> Self {
        Self::new()
    }
}

// Trait implementations

impl PluginRegistry for SecurityContext {
    fn register_plugin(&self, plugin_id: &str, policy: SecurityPolicy) -> SandboxResult<()> {
        self.register_plugin(plugin_id, policy)
    }

    fn unregister_plugin(&self, plugin_id: &str) -> bool {
        self.unregister_plugin(plugin_id)
    }

    fn is_registered(&self, plugin_id: &str) -> bool {
        self.is_registered(plugin_id)
    }

    fn get_policy(&self, plugin_id: &str) -> Option<Arc<SecurityPolicy>> {
        self.get_policy(plugin_id)
    }
}

impl PolicyEvaluator for SecurityContext {
    fn check_permission(&self, plugin_id: &str, permission: &str) -> bool {
        self.check_permission(plugin_id, permission)
    }

    fn check_restriction(
        &self,
        plugin_id: &str,
        restriction_type: RestrictionType,
        target: &str,
    ) -> bool {
        self.check_restriction(plugin_id, restriction_type, target)
    }

    fn validate_network_request(&self, plugin_id: &str, url: &str) -> bool {
        self.validate_network_request(plugin_id, url)
    }

    fn validate_storage_operation(
        &self,
        plugin_id: &str,
        operation: StorageOperation,
        key: &str,
        value: Option<&serde_json::Value>,
    ) -> bool {
        self.validate_storage_operation(plugin_id, operation, key, value)
    }
}

impl UsageReporter for SecurityContext {
    fn get_usage(&self, plugin_id: &str) -> Option<ResourceUsage> {
        self.get_usage(plugin_id)
    }

    fn get_violations(&self, plugin_id: Option<&str>) -> Vec<SecurityViolation> {
        self.get_violations(plugin_id)
    }
}
