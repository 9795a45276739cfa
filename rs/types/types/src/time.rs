//! Ingress expiry times.
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// The longest an ingress message may wait before the network expires it.
pub const MAX_INGRESS_TTL: Duration = Duration::from_secs(5 * 60);

/// Subtracted from the requested time-to-live so that a sender whose clock
/// runs ahead of the network's does not produce expiries too far in the
/// future.
pub const PERMITTED_DRIFT: Duration = Duration::from_secs(60);

/// Nanoseconds since the Unix epoch at which a request sent at `now` with
/// time-to-live `ttl` expires.
pub fn expiry_time_at(now: SystemTime, ttl: Duration) -> u64 {
    let since_epoch = now.duration_since(UNIX_EPOCH).unwrap_or_default();
    let expiry = since_epoch + ttl.saturating_sub(PERMITTED_DRIFT);
    u64::try_from(expiry.as_nanos()).unwrap_or(u64::MAX)
}

/// Like [`expiry_time_at`], starting from the current time.
pub fn expiry_time_from_now(ttl: Duration) -> u64 {
    expiry_time_at(SystemTime::now(), ttl)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_subtracts_permitted_drift() {
        let now = UNIX_EPOCH + Duration::from_secs(1_000);
        assert_eq!(
            expiry_time_at(now, MAX_INGRESS_TTL),
            (1_000 + 4 * 60) * 1_000_000_000
        );
    }

    #[test]
    fn short_ttl_does_not_underflow() {
        let now = UNIX_EPOCH + Duration::from_secs(10);
        assert_eq!(
            expiry_time_at(now, Duration::from_secs(30)),
            10 * 1_000_000_000
        );
    }
}
