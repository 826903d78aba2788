//! Freshness policy for cached reads.
//!
//! A [`FetchPolicy`] splits an entry's age into three bands:
//!
//! - `age <= fresh_window`: served as-is, no fetch.
//! - `fresh_window < age <= stale_window`: served as-is while a background
//!   refresh runs.
//! - `age > stale_window`: treated as absent; the caller waits for a fetch.

use crate::error::PolicyError;

use std::time::Duration;

const DEFAULT_FRESH_WINDOW: Duration = Duration::from_secs(30);
const DEFAULT_STALE_WINDOW: Duration = Duration::from_secs(5 * 60);

/// How a cached entry should be treated, given its age.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Freshness {
  Fresh,
  Stale,
  Expired,
}

/// The fresh and stale windows applied by `SyncCache::get`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "raw::FetchPolicyRaw"))]
pub struct FetchPolicy {
  fresh_window: Duration,
  stale_window: Duration,
}

impl FetchPolicy {
  /// Creates a policy. Fails if `fresh_window` is longer than `stale_window`.
  pub fn new(fresh_window: Duration, stale_window: Duration) -> Result<Self, PolicyError> {
    if fresh_window > stale_window {
      return Err(PolicyError::FreshExceedsStale {
        fresh: fresh_window,
        stale: stale_window,
      });
    }
    Ok(Self {
      fresh_window,
      stale_window,
    })
  }

  /// A policy that never serves a cached value without a refresh.
  pub fn always_revalidate(stale_window: Duration) -> Self {
    Self {
      fresh_window: Duration::ZERO,
      stale_window,
    }
  }

  pub fn fresh_window(&self) -> Duration {
    self.fresh_window
  }

  pub fn stale_window(&self) -> Duration {
    self.stale_window
  }

  pub(crate) fn classify(&self, age: Duration) -> Freshness {
    if age <= self.fresh_window {
      Freshness::Fresh
    } else if age <= self.stale_window {
      Freshness::Stale
    } else {
      Freshness::Expired
    }
  }
}

impl Default for FetchPolicy {
  fn default() -> Self {
    Self {
      fresh_window: DEFAULT_FRESH_WINDOW,
      stale_window: DEFAULT_STALE_WINDOW,
    }
  }
}

#[cfg(feature = "serde")]
mod raw {
  use super::FetchPolicy;
  use crate::error::PolicyError;

  use serde::Deserialize;
  use std::time::Duration;

  // Durations are written as human-readable strings, e.g. "30s" or "5m".
  #[derive(Debug, Deserialize)]
  #[serde(deny_unknown_fields)]
  pub(super) struct FetchPolicyRaw {
    #[serde(deserialize_with = "human_duration")]
    fresh_window: Duration,
    #[serde(deserialize_with = "human_duration")]
    stale_window: Duration,
  }

  impl TryFrom<FetchPolicyRaw> for FetchPolicy {
    type Error = PolicyError;

    fn try_from(raw: FetchPolicyRaw) -> Result<Self, Self::Error> {
      FetchPolicy::new(raw.fresh_window, raw.stale_window)
    }
  }

  fn human_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
  where
    D: serde::Deserializer<'de>,
  {
    let s = String::deserialize(deserializer)?;
    humantime::parse_duration(&s).map_err(serde::de::Error::custom)
  }
}
