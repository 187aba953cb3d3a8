/*!
 * Security Module
 * Policy registry and evaluation predicates
 */

pub mod context;
pub mod network;
pub mod storage;
pub mod traits;

// Re-export for convenience
pub use context::{ContextStats, SecurityContext};
pub use storage::StorageOperation;
pub use traits::*;
