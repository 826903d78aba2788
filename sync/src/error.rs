use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// A fetcher's error, shared by every caller joined on the same fetch.
pub type SharedError = Arc<dyn StdError + Send + Sync + 'static>;

/// Errors returned by cache operations.
///
/// The type is `Clone` so that one failed fetch can be handed to every caller
/// that was waiting on it.
#[derive(Debug, Clone, Error)]
pub enum SyncError {
  /// The fetcher returned an error and no cached value was available to
  /// fall back on. The original error is kept as the source.
  #[error("fetch failed: {0}")]
  Fetch(#[source] SharedError),

  /// The fetch future panicked before producing a value.
  #[error("fetch for key '{key}' panicked")]
  FetchPanicked { key: String },

  /// The key holds a value of a different type than the one requested.
  #[error("key '{key}' does not hold a value of type `{expected}`")]
  TypeMismatch { key: String, expected: &'static str },

  /// An auto-refresh interval must be non-zero.
  #[error("auto-refresh interval must be greater than zero")]
  InvalidInterval,
}

impl SyncError {
  pub(crate) fn fetch<E>(err: E) -> Self
  where
    E: StdError + Send + Sync + 'static,
  {
    SyncError::Fetch(Arc::new(err))
  }

  pub(crate) fn type_mismatch<T>(key: &str) -> Self {
    SyncError::TypeMismatch {
      key: key.to_owned(),
      expected: std::any::type_name::<T>(),
    }
  }

  /// Returns the fetcher's original error, if this is a fetch failure.
  pub fn fetch_error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
    match self {
      SyncError::Fetch(err) => Some(err.as_ref()),
      _ => None,
    }
  }
}

/// Errors that can occur when constructing a `FetchPolicy`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
  /// The fresh window must not outlast the stale window.
  #[error("fresh window ({fresh:?}) exceeds stale window ({stale:?})")]
  FreshExceedsStale { fresh: Duration, stale: Duration },
}

/// Errors that can occur when building a cache.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
  /// No `TaskSpawner` was configured and no Tokio runtime was available to
  /// fall back on (or the default `tokio` feature is disabled).
  #[error("a task spawner is required: configure one or build inside a Tokio runtime")]
  SpawnerRequired,
}
