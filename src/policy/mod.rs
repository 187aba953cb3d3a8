/*!
 * Policy Model
 * Pure data describing what a plugin may do
 */

pub mod permissions;
pub mod types;

pub use types::*;
