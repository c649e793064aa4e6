//! Delays as explicit scheduling directives.
//!
//! Drivers that bit-bang a protocol without an acknowledgement channel rely entirely on waiting
//! long enough between line changes. Instead of calling [std::thread::sleep] directly, they hand a
//! [DelayBounds] to a [Delay], so tests can record the schedule instead of sleeping through it.

use std::fmt::Debug;
use std::thread::sleep;
use std::time::Duration;

/// A wait of at least `min` and preferably no more than `max`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DelayBounds {
    pub min: Duration,
    pub max: Duration,
}

impl DelayBounds {
    pub const fn micros(min: u64, max: u64) -> Self {
        DelayBounds {
            min: Duration::from_micros(min),
            max: Duration::from_micros(max),
        }
    }

    pub const fn millis(min: u64, max: u64) -> Self {
        DelayBounds {
            min: Duration::from_millis(min),
            max: Duration::from_millis(max),
        }
    }
}

/// Something that can block the caller for a bounded amount of time.
pub trait Delay: Debug + Send {
    /// Blocks for at least `bounds.min`.
    fn wait(&mut self, bounds: DelayBounds);
}

/// Blocks the current thread using [std::thread::sleep].
///
/// Sleeps for the lower bound, the OS scheduler takes care of the rest.
#[derive(Copy, Clone, Debug, Default)]
pub struct SleepDelay;

impl Delay for SleepDelay {
    fn wait(&mut self, bounds: DelayBounds) {
        sleep(bounds.min);
    }
}
