//! Conversion between POSIX time and the device clock.
//!
//! Device timestamps are 32-bit counts of seconds since 1989-12-31T00:00:00Z,
//! the ANT+ epoch. They are theoretically TAI seconds, but no leap-second
//! adjustment is applied, for consistency with the vendor app.

use std::time::{SystemTime, UNIX_EPOCH};

/// The device epoch, as seconds since the POSIX epoch.
pub const DEVICE_EPOCH: i64 = 631_065_600;

/// Convert a POSIX timestamp to device seconds, truncated to 32 bits.
pub fn to_device(posix_time: i64) -> u32 {
    posix_time.wrapping_sub(DEVICE_EPOCH) as u32
}

/// Convert device seconds to a POSIX timestamp.
pub fn to_posix(device_time: u32) -> i64 {
    i64::from(device_time) + DEVICE_EPOCH
}

/// Convert a wall-clock instant to a POSIX timestamp, rounding fractional
/// seconds up to the next whole second to compensate for propagation lag
/// when setting the device clock.
pub fn posix_round_up(now: SystemTime) -> i64 {
    let since_epoch = now.duration_since(UNIX_EPOCH).unwrap_or_default();
    let mut posix = since_epoch.as_secs() as i64;
    if since_epoch.subsec_nanos() > 0 {
        posix += 1;
    }
    posix
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_epoch_is_zero() {
        assert_eq!(to_device(DEVICE_EPOCH), 0);
        assert_eq!(to_posix(0), DEVICE_EPOCH);
    }

    #[test]
    fn test_round_trip() {
        for posix in [DEVICE_EPOCH, 946_684_800, 2_649_980_946] {
            assert_eq!(to_posix(to_device(posix)), posix);
        }
    }

    #[test]
    fn test_known_timestamp() {
        // 2017-01-01T00:00:00Z.
        assert_eq!(to_device(1_483_228_800), 852_163_200);
    }

    #[test]
    fn test_fractional_seconds_round_up() {
        let exact = UNIX_EPOCH + Duration::new(1_600_000_000, 0);
        let fractional = UNIX_EPOCH + Duration::new(1_600_000_000, 1);
        assert_eq!(posix_round_up(exact), 1_600_000_000);
        assert_eq!(posix_round_up(fractional), 1_600_000_001);
    }
}
