use crate::metrics::Metrics;
use crate::shared::CacheShared;

use std::error::Error as StdError;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{AbortHandle, Abortable};
use futures_util::FutureExt;

/// A recurring task that re-fetches one key on a fixed interval.
///
/// The task holds only a weak reference to the cache core and stops on its
/// own once the cache is dropped. After `stop` the ticker exits at its next
/// poll. A tick already running on another worker may still start the fetch
/// it was about to start.
pub(crate) struct RefreshTimer {
  abort: AbortHandle,
  interval: Duration,
}

impl RefreshTimer {
  /// Spawns the timer. The first tick fires one `interval` after start.
  pub(crate) fn spawn<T, F, Fut, E>(
    shared: &Arc<CacheShared>,
    key: String,
    fetcher: F,
    interval: Duration,
  ) -> Self
  where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    E: StdError + Send + Sync + 'static,
  {
    let (abort, registration) = AbortHandle::new_pair();
    let weak = Arc::downgrade(shared);
    let spawner = shared.spawner.clone();

    let ticker = async move {
      loop {
        spawner.sleep(interval).await;

        let Some(shared) = weak.upgrade() else {
          tracing::debug!(key = %key, "cache dropped; auto-refresh exiting");
          break;
        };
        Metrics::incr(&shared.metrics.refresh_ticks);
        tracing::trace!(key = %key, "auto-refresh tick");

        // The outcome is not awaited here. Failures are logged when the
        // fetch settles and never stop the schedule.
        let _ = CacheShared::fetch(&shared, &key, &fetcher);
      }
    };

    shared
      .spawner
      .spawn(Box::pin(Abortable::new(ticker, registration).map(|_| ())));

    Self { abort, interval }
  }

  pub(crate) fn interval(&self) -> Duration {
    self.interval
  }

  /// Cancels the timer.
  pub(crate) fn stop(self) {
    self.abort.abort();
  }
}
