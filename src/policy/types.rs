/*!
 * Policy Types
 * Declarative per-plugin security policy
 */

use crate::core::errors::{SandboxError, SandboxResult};
use crate::core::limits::WILDCARD_TARGET;
use crate::core::serde::{is_empty_set, is_empty_vec, is_false};
use crate::core::types::Permission;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

/// Capability class a restriction applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestrictionType {
    ApiAccess,
    DomAccess,
    EvalExecution,
    ModuleImport,
    FileAccess,
    NetworkAccess,
    StorageAccess,
    CryptoAccess,
}

impl RestrictionType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            RestrictionType::ApiAccess => "api_access",
            RestrictionType::DomAccess => "dom_access",
            RestrictionType::EvalExecution => "eval_execution",
            RestrictionType::ModuleImport => "module_import",
            RestrictionType::FileAccess => "file_access",
            RestrictionType::NetworkAccess => "network_access",
            RestrictionType::StorageAccess => "storage_access",
            RestrictionType::CryptoAccess => "crypto_access",
        }
    }
}

impl fmt::Display for RestrictionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a matching restriction does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestrictionAction {
    Deny,
    Allow,
    /// Permitted subject to the restriction's parameters; evaluates as not-allowed
    Limit,
}

/// Fine-grained allow/deny/limit rule scoped to a type and target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityRestriction {
    #[serde(rename = "type")]
    pub restriction_type: RestrictionType,
    /// Resource name, or `*` for every resource of this type
    pub target: String,
    pub action: RestrictionAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
}

impl SecurityRestriction {
    pub fn new(
        restriction_type: RestrictionType,
        target: impl Into<String>,
        action: RestrictionAction,
    ) -> Self {
        Self {
            restriction_type,
            target: target.into(),
            action,
            parameters: None,
        }
    }

    pub fn allow(restriction_type: RestrictionType, target: impl Into<String>) -> Self {
        Self::new(restriction_type, target, RestrictionAction::Allow)
    }

    pub fn deny(restriction_type: RestrictionType, target: impl Into<String>) -> Self {
        Self::new(restriction_type, target, RestrictionAction::Deny)
    }

    pub fn limit(
        restriction_type: RestrictionType,
        target: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            parameters: Some(parameters),
            ..Self::new(restriction_type, target, RestrictionAction::Limit)
        }
    }

    /// Whether this rule governs the given type/target pair
    #[inline]
    #[must_use]
    pub fn matches(&self, restriction_type: RestrictionType, target: &str) -> bool {
        self.restriction_type == restriction_type
            && (self.target == target || self.target == WILDCARD_TARGET)
    }
}

/// Resource budgets for one plugin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceLimits {
    /// Memory in MB
    pub memory: u64,
    /// Storage in MB
    pub storage: u64,
    /// CPU in percent
    pub cpu: u32,
    /// Requests per rolling window
    pub network_requests: u32,
    /// File operations per rolling window
    pub file_operations: u32,
    /// Execution time budget in seconds
    pub execution_time: u64,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            memory: 50,
            storage: 10,
            cpu: 50,
            network_requests: 100,
            file_operations: 100,
            execution_time: 30,
        }
    }
}

impl ResourceLimits {
    /// Limits for untrusted plugins
    pub fn minimal() -> Self {
        Self {
            memory: 10,
            storage: 1,
            cpu: 10,
            network_requests: 10,
            file_operations: 10,
            execution_time: 5,
        }
    }

    /// Limits for first-party plugins
    pub fn privileged() -> Self {
        Self {
            memory: 512,
            storage: 100,
            cpu: 100,
            network_requests: 1_000,
            file_operations: 1_000,
            execution_time: 300,
        }
    }
}

/// Network access rules
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NetworkPolicy {
    /// Exact-or-suffix hostname allow-list; empty means any host
    #[serde(skip_serializing_if = "is_empty_vec")]
    pub allowed_domains: Vec<String>,
    /// Exact-or-suffix hostname block-list
    #[serde(skip_serializing_if = "is_empty_vec")]
    pub blocked_domains: Vec<String>,
    /// Empty means any port
    #[serde(skip_serializing_if = "is_empty_vec")]
    pub allowed_ports: Vec<u16>,
    #[serde(skip_serializing_if = "is_empty_vec")]
    pub blocked_ports: Vec<u16>,
    #[serde(skip_serializing_if = "is_false")]
    pub require_https: bool,
    /// Advisory, enforced by the transport
    pub max_request_size: u64,
    /// Advisory, enforced by the transport
    pub max_response_size: u64,
}

/// Key/value storage quotas
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoragePolicy {
    pub max_keys: usize,
    /// Bytes
    pub max_key_size: usize,
    /// Bytes of the JSON-serialized value
    pub max_value_size: usize,
    /// Keys must start with one of these when non-empty
    #[serde(skip_serializing_if = "is_empty_vec")]
    pub allowed_prefixes: Vec<String>,
    /// Advisory, the storage backend encrypts at rest when set
    #[serde(skip_serializing_if = "is_false")]
    pub encryption: bool,
}

impl Default for StoragePolicy {
    fn default() -> Self {
        Self {
            max_keys: 1_000,
            max_key_size: 256,
            max_value_size: 1024 * 1024,
            allowed_prefixes: Vec::new(),
            encryption: false,
        }
    }
}

/// Execution constraints carried for the execution host
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExecutionPolicy {
    pub allow_eval: bool,
    pub allow_dynamic_imports: bool,
    pub allow_workers: bool,
    pub allow_timers: bool,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub max_execution_time: Duration,
    pub max_call_stack_depth: u32,
}

impl Default for ExecutionPolicy {
    fn default() -> Self {
        Self {
            allow_eval: false,
            allow_dynamic_imports: false,
            allow_workers: false,
            allow_timers: true,
            max_execution_time: Duration::from_secs(5),
            max_call_stack_depth: 100,
        }
    }
}

/// Full policy bundle for one plugin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityPolicy {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "is_empty_set")]
    pub permissions: HashSet<Permission>,
    /// Evaluated in order, first match wins
    #[serde(default, skip_serializing_if = "is_empty_vec")]
    pub restrictions: Vec<SecurityRestriction>,
    #[serde(default)]
    pub resources: ResourceLimits,
    #[serde(default)]
    pub network: NetworkPolicy,
    #[serde(default)]
    pub storage: StoragePolicy,
    #[serde(default)]
    pub execution: ExecutionPolicy,
}

impl SecurityPolicy {
    /// Policy with default limits and no permissions
    pub fn new(id: impl Into<String>, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: version.into(),
            permissions: HashSet::new(),
            restrictions: Vec::new(),
            resources: ResourceLimits::default(),
            network: NetworkPolicy::default(),
            storage: StoragePolicy::default(),
            execution: ExecutionPolicy::default(),
        }
    }

    /// Create a minimal policy (most restrictive)
    #[must_use]
    pub fn minimal(id: impl Into<String>) -> Self {
        let id = id.into();
        let mut policy = Self::new(id.clone(), id, "1.0.0");
        policy.resources = ResourceLimits::minimal();
        policy.network.require_https = true;
        policy.restrictions = vec![
            SecurityRestriction::deny(RestrictionType::EvalExecution, WILDCARD_TARGET),
            SecurityRestriction::deny(RestrictionType::ModuleImport, WILDCARD_TARGET),
        ];
        policy
    }

    /// Create a standard policy (balanced)
    #[must_use]
    pub fn standard(id: impl Into<String>) -> Self {
        let id = id.into();
        let mut policy = Self::new(id.clone(), id, "1.0.0");
        for permission in [
            super::permissions::STORAGE_READ,
            super::permissions::STORAGE_WRITE,
            super::permissions::UI_TOAST,
            super::permissions::UI_NOTIFICATIONS,
            super::permissions::NETWORK_HTTP,
            super::permissions::CRYPTO_HASH,
        ] {
            policy.permissions.insert(permission.to_string());
        }
        policy.network.require_https = true;
        policy.restrictions = vec![SecurityRestriction::deny(
            RestrictionType::EvalExecution,
            WILDCARD_TARGET,
        )];
        policy
    }

    /// Create a privileged policy (for trusted plugins)
    #[must_use]
    pub fn privileged(id: impl Into<String>) -> Self {
        let id = id.into();
        let mut policy = Self::new(id.clone(), id, "1.0.0");
        policy.permissions = super::permissions::ALL
            .iter()
            .map(|p| p.to_string())
            .collect();
        policy.resources = ResourceLimits::privileged();
        policy.execution = ExecutionPolicy {
            allow_eval: false,
            allow_dynamic_imports: true,
            allow_workers: true,
            allow_timers: true,
            max_execution_time: Duration::from_secs(60),
            max_call_stack_depth: 1_000,
        };
        policy
    }

    #[must_use]
    pub fn with_permission(mut self, permission: impl Into<Permission>) -> Self {
        self.permissions.insert(permission.into());
        self
    }

    #[must_use]
    pub fn with_restriction(mut self, restriction: SecurityRestriction) -> Self {
        self.restrictions.push(restriction);
        self
    }

    #[must_use]
    pub fn with_resources(mut self, resources: ResourceLimits) -> Self {
        self.resources = resources;
        self
    }

    #[must_use]
    pub fn with_network(mut self, network: NetworkPolicy) -> Self {
        self.network = network;
        self
    }

    #[must_use]
    pub fn with_storage(mut self, storage: StoragePolicy) -> Self {
        self.storage = storage;
        self
    }

    #[must_use]
    pub fn with_execution(mut self, execution: ExecutionPolicy) -> Self {
        self.execution = execution;
        self
    }

    #[inline]
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    /// First restriction governing the type/target pair
    pub fn find_restriction(
        &self,
        restriction_type: RestrictionType,
        target: &str,
    ) -> Option<&SecurityRestriction> {
        self.restrictions
            .iter()
            .find(|r| r.matches(restriction_type, target))
    }

    /// Structural sanity checks performed before registration
    pub fn validate(&self) -> SandboxResult<()> {
        if self.id.trim().is_empty() {
            return Err(SandboxError::InvalidPolicy("policy id is empty".into()));
        }
        if self.name.trim().is_empty() {
            return Err(SandboxError::InvalidPolicy(format!(
                "policy '{}' has an empty name",
                self.id
            )));
        }
        if let Some(port) = self
            .network
            .allowed_ports
            .iter()
            .find(|p| self.network.blocked_ports.contains(p))
        {
            log::warn!(
                "Policy '{}' both allows and blocks port {}; the block wins",
                self.id,
                port
            );
        }
        Ok(())
    }
}
