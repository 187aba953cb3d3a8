/*!
 * API Module
 * Capability surface exposed to plugins and its sandboxed wrapper
 */

pub mod sandboxed;
pub mod traits;
pub mod types;

// Re-export for convenience
pub use sandboxed::{SandboxedApi, SandboxedCrypto, SandboxedNetwork, SandboxedStorage, SandboxedUi};
pub use traits::*;
pub use types::*;
