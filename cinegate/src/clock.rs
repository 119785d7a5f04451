//! Time sources for claim validation

use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
    time::SystemTime,
};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// Unix time
///
/// The number of whole seconds elapsed since 1970-01-01T00:00:00Z, as used by
/// the `exp`, `nbf`, and `iat` claims.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Ord, PartialOrd)]
#[repr(transparent)]
pub struct UnixTime(pub u64);

impl UnixTime {
    /// Adds `secs` seconds, saturating at the numeric bound
    #[must_use]
    pub const fn saturating_add(self, secs: u64) -> Self {
        Self(self.0.saturating_add(secs))
    }

    /// Subtracts `secs` seconds, saturating at the epoch
    #[must_use]
    pub const fn saturating_sub(self, secs: u64) -> Self {
        Self(self.0.saturating_sub(secs))
    }
}

impl From<SystemTime> for UnixTime {
    #[inline]
    fn from(t: SystemTime) -> Self {
        // Clocks set before the epoch read as the epoch itself.
        let secs = t
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        Self(secs)
    }
}

impl fmt::Display for UnixTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl Serialize for UnixTime {
    #[inline]
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

/// Identity providers occasionally emit fractional timestamps; the fraction
/// is dropped.
impl<'de> Deserialize<'de> for UnixTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct UnixTimeVisitor;

        impl<'de> de::Visitor<'de> for UnixTimeVisitor {
            type Value = UnixTime;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a non-negative number of seconds since the Unix epoch")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(UnixTime(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                u64::try_from(v)
                    .map(UnixTime)
                    .map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
                if v.is_finite() && v >= 0.0 && v <= u64::MAX as f64 {
                    Ok(UnixTime(v.trunc() as u64))
                } else {
                    Err(E::invalid_value(de::Unexpected::Float(v), &self))
                }
            }
        }

        deserializer.deserialize_any(UnixTimeVisitor)
    }
}

/// Represents a clock, which can tell the current time
pub trait Clock: fmt::Debug + Send + Sync {
    /// Gets the current time according to this clock
    fn now(&self) -> UnixTime;
}

/// The system clock as provided by `std::time::SystemTime`
#[derive(Clone, Copy, Debug, Default)]
pub struct System;

impl Clock for System {
    #[inline]
    fn now(&self) -> UnixTime {
        UnixTime::from(SystemTime::now())
    }
}

/// A manually driven clock, for exercising expiration and not-before rules
#[derive(Debug, Default)]
pub struct TestClock(AtomicU64);

impl TestClock {
    /// Creates a new test clock reading `time`
    #[must_use]
    pub const fn new(time: UnixTime) -> Self {
        Self(AtomicU64::new(time.0))
    }

    /// Sets the clock's current time to `time`
    pub fn set(&self, time: UnixTime) {
        self.0.store(time.0, Ordering::Relaxed);
    }

    /// Advances the clock by `secs` seconds
    pub fn advance(&self, secs: u64) {
        self.0.fetch_add(secs, Ordering::Relaxed);
    }
}

impl Clock for TestClock {
    #[inline]
    fn now(&self) -> UnixTime {
        UnixTime(self.0.load(Ordering::Relaxed))
    }
}
