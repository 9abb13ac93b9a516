//! Shared timestamp helpers.
//!
//! funcctl avoids a calendar/timezone dependency for the one thing it actually needs:
//! a monotonic-enough instant to stamp `Created` and to seed the build fingerprint.

use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the Unix epoch. Zero is reserved to mean "never set" (see
/// `Function::created`), so this never returns 0 for a real call.
pub fn now_epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
        .max(1)
}

/// Nanoseconds since the Unix epoch for a file's modification time, used by the build
/// fingerprint. Falls back to 0 if the platform cannot report an mtime.
pub fn mtime_nanos(metadata: &std::fs::Metadata) -> u128 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_nanos())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_epoch_secs_is_never_zero() {
        assert!(now_epoch_secs() > 0);
    }
}
