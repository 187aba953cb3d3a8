/*!
 * Storage Rule Helpers
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// Storage operation being validated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageOperation {
    Get,
    Set,
    Remove,
}

impl StorageOperation {
    pub const fn as_str(&self) -> &'static str {
        match self {
            StorageOperation::Get => "get",
            StorageOperation::Set => "set",
            StorageOperation::Remove => "remove",
        }
    }
}

impl fmt::Display for StorageOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key carries one of the allowed prefixes; an empty list allows every key
#[inline]
pub fn key_has_allowed_prefix(key: &str, prefixes: &[String]) -> bool {
    prefixes.is_empty() || prefixes.iter().any(|p| key.starts_with(p.as_str()))
}

/// Length in bytes of the JSON serialization of `value`
pub fn serialized_len(value: &serde_json::Value) -> usize {
    // Value serialization only fails on non-string map keys, which Value cannot hold
    serde_json::to_vec(value).map_or(usize::MAX, |bytes| bytes.len())
}
