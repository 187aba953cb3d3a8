/*!
 * Sandbox Limits and Constants
 *
 * Centralized location for sandbox-wide thresholds and magic numbers.
 * Security-critical constants are marked with [SECURITY]
 */

use std::time::Duration;

// =============================================================================
// RESOURCE ACCOUNTING
// =============================================================================

/// Rolling window for counted resources (network requests, file operations)
/// [SECURITY] Window resets only once strictly more than this has elapsed
pub const NETWORK_WINDOW: Duration = Duration::from_secs(60);

/// Bytes per megabyte used for memory/storage accounting
pub const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

// =============================================================================
// VIOLATION NOTIFICATION
// =============================================================================

/// Broadcast buffer for violation events
/// Slow subscribers lag (and skip) rather than stall the gate
pub const VIOLATION_CHANNEL_CAPACITY: usize = 1024;

// =============================================================================
// POLICY MATCHING
// =============================================================================

/// Restriction target matching every resource
pub const WILDCARD_TARGET: &str = "*";

/// Default port when an https URL carries none
pub const DEFAULT_HTTPS_PORT: u16 = 443;

/// Default port for every other scheme
pub const DEFAULT_HTTP_PORT: u16 = 80;
