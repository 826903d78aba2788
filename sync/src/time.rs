use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

// The single, static reference point for all time calculations in the cache.
// It is initialized lazily on its first use.
static CACHE_EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Converts an `Instant` into a `Duration` since the cache's epoch.
#[inline]
pub(crate) fn instant_to_duration(instant: Instant) -> Duration {
  instant.saturating_duration_since(*CACHE_EPOCH)
}

/// A helper to get the current time as a `Duration` since the epoch.
#[inline]
pub(crate) fn now_duration() -> Duration {
  instant_to_duration(Instant::now())
}

/// A monotonic time source used to age cache entries.
///
/// Readings are durations since an arbitrary, fixed origin. Only differences
/// between two readings of the same clock are meaningful.
pub trait Clock: Send + Sync + 'static {
  fn now(&self) -> Duration;
}

/// The default clock, backed by `std::time::Instant`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
  #[inline]
  fn now(&self) -> Duration {
    now_duration()
  }
}

/// A clock that only moves when told to.
///
/// Useful for exercising freshness windows deterministically.
#[derive(Debug, Default)]
pub struct ManualClock {
  nanos: AtomicU64,
}

impl ManualClock {
  pub fn new() -> Self {
    Self::default()
  }

  /// Moves the clock forward by `by`.
  pub fn advance(&self, by: Duration) {
    let by = saturating_nanos(by);
    let _ = self
      .nanos
      .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| Some(n.saturating_add(by)));
  }

  /// Sets the clock to an absolute reading.
  pub fn set(&self, to: Duration) {
    self.nanos.store(saturating_nanos(to), Ordering::SeqCst);
  }
}

// Readings past u64::MAX nanoseconds (~584 years) pin at the maximum.
fn saturating_nanos(d: Duration) -> u64 {
  u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

impl Clock for ManualClock {
  fn now(&self) -> Duration {
    Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
  }
}

// Lets tests keep a handle to the clock they pass to the builder.
impl<C: Clock> Clock for std::sync::Arc<C> {
  fn now(&self) -> Duration {
    (**self).now()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn manual_clock_only_moves_when_advanced() {
    let clock = ManualClock::new();
    assert_eq!(clock.now(), Duration::ZERO);

    clock.advance(Duration::from_millis(1500));
    assert_eq!(clock.now(), Duration::from_millis(1500));

    clock.set(Duration::from_secs(6));
    assert_eq!(clock.now(), Duration::from_secs(6));
  }

  #[test]
  fn manual_clock_saturates_instead_of_wrapping() {
    let clock = ManualClock::new();
    clock.set(Duration::MAX);
    assert_eq!(clock.now(), Duration::from_nanos(u64::MAX));

    clock.set(Duration::from_secs(1));
    clock.advance(Duration::MAX);
    assert_eq!(clock.now(), Duration::from_nanos(u64::MAX));
  }

  #[test]
  fn system_clock_is_monotonic() {
    let clock = SystemClock;
    let a = clock.now();
    let b = clock.now();
    assert!(b >= a);
  }
}
