/*!
 * Plugin Sandbox Library
 * Runtime security sandbox for untrusted plugins
 *
 * A `SecurityContext` owns every plugin's policy and usage record; a
 * `SandboxedApi` wraps the host capability API and routes each call through
 * the context before delegating.
 */

pub mod api;
pub mod config;
pub mod core;
pub mod monitoring;
pub mod policy;
pub mod security;

// Re-exports
pub use api::{PluginApi, SandboxedApi};
pub use config::{load_policies, register_policies, SandboxSettings};
pub use crate::core::{
    ApiError, Clock, DenialKind, ManualClock, PluginId, SandboxError, SandboxResult, SystemClock,
};
pub use monitoring::{
    init_tracing, MonitorStats, ResourceMonitor, ResourceUsage, SecurityViolation, Severity,
};
pub use policy::{
    ExecutionPolicy, NetworkPolicy, ResourceLimits, RestrictionAction, RestrictionType,
    SecurityPolicy, SecurityRestriction, StoragePolicy,
};
pub use security::{ContextStats, SecurityContext, StorageOperation};
