use crate::error::BuildError;
use crate::handles::SyncCache;
use crate::policy::FetchPolicy;
use crate::shared::CacheShared;
use crate::time::{Clock, SystemClock};
use crate::TaskSpawner;

use core::fmt;
use std::sync::Arc;

/// A builder for creating `SyncCache` instances.
pub struct SyncCacheBuilder {
  default_policy: FetchPolicy,
  clock: Option<Arc<dyn Clock>>,
  spawner: Option<Arc<dyn TaskSpawner>>,
}

// Manual Debug implementation for SyncCacheBuilder.
impl fmt::Debug for SyncCacheBuilder {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SyncCacheBuilder")
      .field("default_policy", &self.default_policy)
      .field("has_clock", &self.clock.is_some())
      .field("has_spawner", &self.spawner.is_some())
      .finish()
  }
}

impl SyncCacheBuilder {
  /// Creates a new `SyncCacheBuilder` with default settings.
  pub fn new() -> Self {
    Self {
      default_policy: FetchPolicy::default(),
      clock: None,
      spawner: None,
    }
  }

  /// Sets the policy used by `get_with_default`.
  ///
  /// Defaults to a 30 second fresh window and a 5 minute stale window.
  pub fn default_policy(mut self, policy: FetchPolicy) -> Self {
    self.default_policy = policy;
    self
  }

  /// Sets the clock used to age entries. Defaults to [`SystemClock`].
  pub fn clock<C: Clock>(mut self, clock: C) -> Self {
    self.clock = Some(Arc::new(clock));
    self
  }

  /// Sets the spawner that runs fetches and auto-refresh timers.
  ///
  /// With the `tokio` feature enabled (the default) and no spawner set, the
  /// current Tokio runtime is used.
  pub fn spawner(mut self, spawner: Arc<dyn TaskSpawner>) -> Self {
    self.spawner = Some(spawner);
    self
  }

  /// Builds a `SyncCache`.
  pub fn build(mut self) -> Result<SyncCache, BuildError> {
    let spawner = match self.spawner.take() {
      Some(spawner) => spawner,
      None => Self::default_spawner()?,
    };
    let clock = self.clock.take().unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);

    let shared = CacheShared::new(self.default_policy, clock, spawner);
    tracing::debug!(policy = ?self.default_policy, "sync cache built");
    Ok(SyncCache {
      shared: Arc::new(shared),
    })
  }

  #[cfg(feature = "tokio")]
  fn default_spawner() -> Result<Arc<dyn TaskSpawner>, BuildError> {
    crate::runtime::TokioSpawner::try_current()
      .map(|spawner| Arc::new(spawner) as Arc<dyn TaskSpawner>)
      .ok_or(BuildError::SpawnerRequired)
  }

  #[cfg(not(feature = "tokio"))]
  fn default_spawner() -> Result<Arc<dyn TaskSpawner>, BuildError> {
    Err(BuildError::SpawnerRequired)
  }
}

impl Default for SyncCacheBuilder {
  fn default() -> Self {
    Self::new()
  }
}
