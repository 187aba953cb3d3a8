/*!
 * Resource Monitoring
 * Usage accounting, violation log and structured tracing
 */

pub mod resource;
pub mod tracer;
pub mod violations;

pub use resource::{MonitorStats, ResourceMonitor, ResourceUsage};
pub use tracer::{init_tracing, init_tracing_with, span_capability, CapabilitySpan};
pub use violations::{SecurityViolation, Severity, ViolationBroadcaster};
