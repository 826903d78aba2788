use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

/// A cached value with its concrete type erased.
pub(crate) type ErasedValue = Arc<dyn Any + Send + Sync>;

/// A container for a value in the cache, holding all necessary metadata.
///
/// Entries are replaced wholesale under the entries lock, so `value` and
/// `fetched_at` always change together.
#[derive(Clone)]
pub(crate) struct CacheEntry {
  /// The user's value, wrapped in an Arc for shared ownership.
  pub(crate) value: ErasedValue,
  /// Clock reading at which `value` was obtained.
  pub(crate) fetched_at: Duration,
  /// Set once the entry was served past its fresh window. Advisory only.
  pub(crate) stale: bool,
}

impl CacheEntry {
  pub(crate) fn new(value: ErasedValue, fetched_at: Duration) -> Self {
    Self {
      value,
      fetched_at,
      stale: false,
    }
  }

  /// Time elapsed since the value was obtained, as of `now`.
  #[inline]
  pub(crate) fn age(&self, now: Duration) -> Duration {
    now.saturating_sub(self.fetched_at)
  }

  pub(crate) fn info(&self, now: Duration) -> EntryInfo {
    EntryInfo {
      age: self.age(now),
      stale: self.stale,
    }
  }
}

/// Read-only metadata about a cached entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryInfo {
  /// Time since the value was fetched or optimistically updated.
  pub age: Duration,
  /// Whether the value was served past its fresh window and has not been
  /// replaced since.
  pub stale: bool,
}
