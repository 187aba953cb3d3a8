/*!
 * Security Traits
 * Plugin registry and policy evaluation abstractions
 */

use super::storage::StorageOperation;
use crate::core::errors::SandboxResult;
use crate::monitoring::{ResourceUsage, SecurityViolation};
use crate::policy::{RestrictionType, SecurityPolicy};
use std::sync::Arc;

/// Plugin lifecycle interface driven by the plugin host
pub trait PluginRegistry: Send + Sync {
    /// Install (or replace) a plugin's policy and reset its usage
    fn register_plugin(&self, plugin_id: &str, policy: SecurityPolicy) -> SandboxResult<()>;

    /// Remove a plugin's policy and usage; violations are kept
    fn unregister_plugin(&self, plugin_id: &str) -> bool;

    fn is_registered(&self, plugin_id: &str) -> bool;

    fn get_policy(&self, plugin_id: &str) -> Option<Arc<SecurityPolicy>>;
}

/// Policy predicates
pub trait PolicyEvaluator: Send + Sync {
    /// Coarse capability grant
    fn check_permission(&self, plugin_id: &str, permission: &str) -> bool;

    /// Fine-grained restriction lookup, default allow
    fn check_restriction(
        &self,
        plugin_id: &str,
        restriction_type: RestrictionType,
        target: &str,
    ) -> bool;

    /// Rate window, scheme, domain and port checks
    fn validate_network_request(&self, plugin_id: &str, url: &str) -> bool;

    /// Prefix, key size and value size checks
    fn validate_storage_operation(
        &self,
        plugin_id: &str,
        operation: StorageOperation,
        key: &str,
        value: Option<&serde_json::Value>,
    ) -> bool;
}

/// Usage and audit queries for dashboards and quarantine logic
pub trait UsageReporter: Send + Sync {
    fn get_usage(&self, plugin_id: &str) -> Option<ResourceUsage>;

    fn get_violations(&self, plugin_id: Option<&str>) -> Vec<SecurityViolation>;
}
