//! Host clock tick rate
//!
//! Per-core CPU counters are reported in clock ticks (jiffies). The rate is
//! read once from `sysconf(_SC_CLK_TCK)` at startup and handed to the
//! projector; it never changes for the lifetime of the process.

use tracing::{info, warn};

/// Clock ticks per second
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockTickRate(u64);

impl ClockTickRate {
    /// Rate assumed when the host does not report one
    pub const DEFAULT: ClockTickRate = ClockTickRate(100);

    /// Explicit rate, zero is replaced by the default
    pub fn new(ticks_per_second: u64) -> Self {
        if ticks_per_second == 0 {
            Self::DEFAULT
        } else {
            Self(ticks_per_second)
        }
    }

    /// Resolve the rate from the host configuration
    pub fn from_host() -> Self {
        match host_clock_ticks() {
            Some(ticks) => {
                info!(clock_ticks = ticks, "Resolved sysconf(_SC_CLK_TCK)");
                Self::new(ticks)
            }
            None => {
                warn!(
                    clock_ticks = Self::DEFAULT.0,
                    "Can't get _SC_CLK_TCK, using default clock tick rate"
                );
                Self::DEFAULT
            }
        }
    }

    pub fn ticks_per_second(self) -> u64 {
        self.0
    }

    /// Convert a tick count to seconds
    pub fn to_seconds(self, ticks: u64) -> f64 {
        ticks as f64 / self.0 as f64
    }
}

impl Default for ClockTickRate {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(unix)]
fn host_clock_ticks() -> Option<u64> {
    // SAFETY: sysconf has no preconditions and only reads configuration.
    let ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    u64::try_from(ticks).ok().filter(|t| *t > 0)
}

#[cfg(not(unix))]
fn host_clock_ticks() -> Option<u64> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticks_to_seconds() {
        let rate = ClockTickRate::new(100);
        assert_eq!(rate.to_seconds(250), 2.5);
        assert_eq!(rate.to_seconds(0), 0.0);
    }

    #[test]
    fn test_zero_rate_uses_default() {
        assert_eq!(ClockTickRate::new(0), ClockTickRate::DEFAULT);
        assert_eq!(ClockTickRate::default().ticks_per_second(), 100);
    }

    #[test]
    fn test_host_rate_is_positive() {
        assert!(ClockTickRate::from_host().ticks_per_second() > 0);
    }
}
