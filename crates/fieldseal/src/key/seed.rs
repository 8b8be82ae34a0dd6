//! Key seed construction: application id, deployment host, and month bucket.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Datelike, Utc};

/// Fixed PBKDF2 salt shared by every deployment and every month.
pub const SALT: [u8; 16] = *b"farmshop-pii-slt";

/// Minimum PBKDF2-HMAC-SHA256 iteration count accepted by configuration.
pub const MIN_KDF_ITERATIONS: u32 = 100_000;

/// A calendar month (UTC) selecting which derived key is current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyBucket {
    year: i32,
    month: u32,
}

impl KeyBucket {
    /// Returns `None` unless `month` is in `1..=12`.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    /// The bucket containing `at`.
    pub fn containing(at: DateTime<Utc>) -> Self {
        Self {
            year: at.year(),
            month: at.month(),
        }
    }

    /// Calendar year.
    pub fn year(&self) -> i32 {
        self.year
    }

    /// Calendar month, 1 to 12.
    pub fn month(&self) -> u32 {
        self.month
    }

    /// The month before this one.
    pub fn previous(self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// Whole months from `earlier` to `self`; negative if `earlier` is later.
    pub fn months_since(self, earlier: KeyBucket) -> i64 {
        i64::from(self.year - earlier.year) * 12 + i64::from(self.month) - i64::from(earlier.month)
    }
}

/// The PBKDF2 password: `{app_name}-{hostname}-{year}-{month}`.
///
/// The seed is the only input that distinguishes one key from another, so it
/// is redacted from `Debug` output.
pub struct KeySeed(String);

impl KeySeed {
    /// Build the seed for `bucket`. The month is not zero-padded.
    pub fn new(app_name: &str, hostname: &str, bucket: KeyBucket) -> Self {
        Self(format!(
            "{app_name}-{hostname}-{}-{}",
            bucket.year, bucket.month
        ))
    }

    /// UTF-8 bytes of the seed, used as the PBKDF2 password.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for KeySeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeySeed([REDACTED])")
    }
}

/// Source of wall-clock time for selecting the key bucket.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that reports a settable instant. Used by tests and for replaying
/// data written in a known month.
#[derive(Debug, Clone)]
pub struct FixedClock {
    at: Arc<ArcSwap<DateTime<Utc>>>,
}

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            at: Arc::new(ArcSwap::from_pointee(at)),
        }
    }

    /// Move the clock to `at`. Clones share the same instant.
    pub fn set(&self, at: DateTime<Utc>) {
        self.at.store(Arc::new(at));
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        **self.at.load()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn bucket_rejects_invalid_month() {
        assert!(KeyBucket::new(2026, 0).is_none());
        assert!(KeyBucket::new(2026, 13).is_none());
        assert!(KeyBucket::new(2026, 12).is_some());
    }

    #[test]
    fn bucket_uses_calendar_month() {
        let at = Utc.with_ymd_and_hms(2026, 3, 31, 23, 59, 59).unwrap();
        let b = KeyBucket::containing(at);
        assert_eq!((b.year(), b.month()), (2026, 3));
    }

    #[test]
    fn previous_wraps_year() {
        let jan = KeyBucket::new(2026, 1).unwrap();
        assert_eq!(jan.previous(), KeyBucket::new(2025, 12).unwrap());
        assert_eq!(
            KeyBucket::new(2026, 7).unwrap().previous(),
            KeyBucket::new(2026, 6).unwrap()
        );
    }

    #[test]
    fn months_since_spans_years() {
        let a = KeyBucket::new(2025, 11).unwrap();
        let b = KeyBucket::new(2026, 2).unwrap();
        assert_eq!(b.months_since(a), 3);
        assert_eq!(a.months_since(b), -3);
        assert_eq!(a.months_since(a), 0);
    }

    #[test]
    fn seed_format() {
        let seed = KeySeed::new("farmshop", "shop.example", KeyBucket::new(2026, 3).unwrap());
        assert_eq!(seed.as_bytes(), b"farmshop-shop.example-2026-3");
        assert_eq!(format!("{seed:?}"), "KeySeed([REDACTED])");
    }

    #[test]
    fn salt_is_sixteen_bytes() {
        assert_eq!(SALT.len(), 16);
    }

    #[test]
    fn fixed_clock_clones_share_time() {
        let start = Utc.with_ymd_and_hms(2026, 1, 15, 0, 0, 0).unwrap();
        let clock = FixedClock::new(start);
        let other = clock.clone();
        let later = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        other.set(later);
        assert_eq!(clock.now(), later);
    }
}
