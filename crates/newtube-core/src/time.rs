//! Timestamp helpers.
//!
//! All timestamps in the data model are unix milliseconds, matching the
//! wire-visible `updatedAt`/`createdAt`/`timestamp` fields.

use std::time::{SystemTime, UNIX_EPOCH};

/// Returns the current time as unix milliseconds.
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_millis_is_monotonic_ish() {
        let a = now_millis();
        let b = now_millis();
        assert!(b >= a);
    }
}
