/*!
 * Serde Helpers
 * Timestamp encoding and skip predicates shared by policy and violation types
 */

use serde::{Deserialize, Deserializer, Serializer};
use std::collections::HashSet;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Serialize SystemTime as milliseconds since UNIX epoch
pub mod system_time_millis {
    use super::*;

    pub fn serialize<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let duration = time
            .duration_since(UNIX_EPOCH)
            .map_err(serde::ser::Error::custom)?;
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SystemTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(UNIX_EPOCH + Duration::from_millis(millis))
    }
}

/// Skip serializing if Vec is empty
pub fn is_empty_vec<T>(value: &Vec<T>) -> bool {
    value.is_empty()
}

/// Skip serializing if set is empty
pub fn is_empty_set<T>(value: &HashSet<T>) -> bool {
    value.is_empty()
}

/// Skip serializing if flag is unset
pub fn is_false(value: &bool) -> bool {
    !*value
}
