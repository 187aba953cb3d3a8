/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use crate::core::types::PluginId;
use crate::monitoring::violations::SecurityViolation;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the unrestricted capability implementation
///
/// The sandbox never produces these itself; they pass through untouched.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum ApiError {
    #[error("Not found: {0}")]
    #[diagnostic(code(capability::not_found))]
    NotFound(String),

    #[error("Operation failed: {0}")]
    #[diagnostic(code(capability::failed))]
    Failed(String),

    #[error("Network error: {0}")]
    #[diagnostic(code(capability::network))]
    Network(String),

    #[error("Not supported: {0}")]
    #[diagnostic(code(capability::unsupported))]
    Unsupported(String),
}

/// Classification of a recorded security denial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    /// Capability family not granted
    PermissionDenied,
    /// Restriction, network or storage rule failed
    PolicyViolation,
    /// Rolling-window or execution-time budget exceeded
    ResourceExceeded,
    /// Malformed input such as an unparseable URL
    InvalidInput,
}

/// Unified sandbox error type with miette diagnostics
///
/// Every denial variant carries the full violation record that was logged
/// for it, so callers and loggers share one shape.
#[derive(Error, Debug, Clone, Serialize, Deserialize, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum SandboxError {
    #[error("Permission denied for plugin '{}': {}", .0.plugin_id, .0.action)]
    #[diagnostic(
        code(sandbox::permission_denied),
        help("The capability family is not granted in the plugin's policy permissions.")
    )]
    PermissionDenied(Box<SecurityViolation>),

    #[error("Policy violation by plugin '{}': {}", .0.plugin_id, .0.action)]
    #[diagnostic(
        code(sandbox::policy_violation),
        help("The request was rejected by a restriction, network or storage rule.")
    )]
    PolicyViolation(Box<SecurityViolation>),

    #[error("Resource limit exceeded by plugin '{}': {}", .0.plugin_id, .0.action)]
    #[diagnostic(
        code(sandbox::resource_exceeded),
        help("A windowed or execution-time budget was exhausted. Retry after the window resets.")
    )]
    ResourceExceeded(Box<SecurityViolation>),

    #[error("Invalid input from plugin '{}': {}", .0.plugin_id, .0.action)]
    #[diagnostic(
        code(sandbox::invalid_input),
        help("The request could not be interpreted, e.g. a malformed URL.")
    )]
    InvalidInput(Box<SecurityViolation>),

    #[error("Plugin '{0}' is not registered")]
    #[diagnostic(
        code(sandbox::not_registered),
        help("Register the plugin with a security policy before invoking capabilities.")
    )]
    PluginNotRegistered(PluginId),

    #[error("Invalid policy: {0}")]
    #[diagnostic(code(sandbox::invalid_policy))]
    InvalidPolicy(String),

    #[error("Configuration error: {0}")]
    #[diagnostic(
        code(sandbox::configuration_error),
        help("Review sandbox settings and policy files.")
    )]
    Config(String),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Capability(#[from] ApiError),
}

impl SandboxError {
    /// Build the denial variant matching `kind`
    pub fn denied(kind: DenialKind, violation: SecurityViolation) -> Self {
        let violation = Box::new(violation);
        match kind {
            DenialKind::PermissionDenied => SandboxError::PermissionDenied(violation),
            DenialKind::PolicyViolation => SandboxError::PolicyViolation(violation),
            DenialKind::ResourceExceeded => SandboxError::ResourceExceeded(violation),
            DenialKind::InvalidInput => SandboxError::InvalidInput(violation),
        }
    }

    /// Denial classification, `None` for non-security errors
    pub fn denial_kind(&self) -> Option<DenialKind> {
        match self {
            SandboxError::PermissionDenied(_) => Some(DenialKind::PermissionDenied),
            SandboxError::PolicyViolation(_) => Some(DenialKind::PolicyViolation),
            SandboxError::ResourceExceeded(_) => Some(DenialKind::ResourceExceeded),
            SandboxError::InvalidInput(_) => Some(DenialKind::InvalidInput),
            _ => None,
        }
    }

    /// The violation record attached to a denial
    pub fn violation(&self) -> Option<&SecurityViolation> {
        match self {
            SandboxError::PermissionDenied(v)
            | SandboxError::PolicyViolation(v)
            | SandboxError::ResourceExceeded(v)
            | SandboxError::InvalidInput(v) => Some(v),
            _ => None,
        }
    }
}

/// Result type for sandbox operations
pub type SandboxResult<T> = std::result::Result<T, SandboxError>;
