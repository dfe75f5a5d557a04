//! Store key layout
//!
//! Check outputs live in one ordered partition per check name, keyed by the
//! Unix-second timestamp of the output. Action outputs live in a single flat
//! partition keyed by `{check}_{action}_{timestamp}`.
//!
//! Timestamp keys are zero-padded to a fixed width so lexicographic order and
//! numeric order coincide for every representable timestamp. Backends rely on
//! this: "latest" is simply the lexicographically last key.

use chrono::{DateTime, Utc};

/// Width of an encoded timestamp key (digits in `u64::MAX`)
pub const TIMESTAMP_KEY_WIDTH: usize = 20;

/// Encode a timestamp as a fixed-width, order-preserving store key
///
/// Instants before the Unix epoch clamp to zero.
pub fn timestamp_key(timestamp: &DateTime<Utc>) -> String {
    let secs = timestamp.timestamp().max(0) as u64;
    format!("{:0width$}", secs, width = TIMESTAMP_KEY_WIDTH)
}

/// Decode a key produced by [`timestamp_key`]
pub fn parse_timestamp_key(key: &str) -> Option<DateTime<Utc>> {
    if key.len() != TIMESTAMP_KEY_WIDTH {
        return None;
    }
    let secs: i64 = key.parse().ok()?;
    DateTime::from_timestamp(secs, 0)
}

/// Composite key for an action output
pub fn action_key(check_name: &str, action_name: &str, timestamp: &DateTime<Utc>) -> String {
    format!("{}_{}_{}", check_name, action_name, timestamp_key(timestamp))
}
