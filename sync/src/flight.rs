use crate::entry::ErasedValue;
use crate::error::SyncError;

use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, Waker};

/// What a settled fetch produced.
pub(crate) type Outcome = Result<ErasedValue, SyncError>;

/// The internal state of a fetch.
pub(crate) enum State {
  Fetching,
  Settled(Outcome),
}

/// The internal, mutex-protected core of the FetchFuture.
pub(crate) struct Inner {
  pub(crate) state: State,
  pub(crate) waiters: Vec<Waker>,
}

/// A future that represents an in-flight fetch for one key.
/// It can be awaited by any number of tasks; all of them observe the same
/// outcome.
pub(crate) struct FetchFuture {
  pub(crate) inner: Mutex<Inner>,
}

impl FetchFuture {
  /// Creates a new `FetchFuture` in the "Fetching" state.
  pub fn new() -> Self {
    Self {
      inner: Mutex::new(Inner {
        state: State::Fetching,
        waiters: Vec::new(),
      }),
    }
  }

  /// Settles the future with an outcome, waking all waiters.
  pub fn complete(&self, outcome: Outcome) {
    let waiters = {
      let mut inner = self.inner.lock();
      inner.state = State::Settled(outcome);
      std::mem::take(&mut inner.waiters)
    };
    for waker in waiters {
      waker.wake();
    }
  }
}

impl Future for &FetchFuture {
  type Output = Outcome;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    let mut inner = self.inner.lock();
    match &inner.state {
      State::Settled(outcome) => Poll::Ready(outcome.clone()),
      State::Fetching => {
        if !inner.waiters.iter().any(|w| w.will_wake(cx.waker())) {
          inner.waiters.push(cx.waker().clone());
        }
        Poll::Pending
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Arc;

  #[tokio::test]
  async fn every_waiter_sees_the_same_value() {
    let flight = Arc::new(FetchFuture::new());

    let waiters: Vec<_> = (0..4)
      .map(|_| {
        let flight = flight.clone();
        tokio::spawn(async move { (&*flight).await })
      })
      .collect();

    tokio::task::yield_now().await;
    flight.complete(Ok(Arc::new(7u32)));

    for waiter in waiters {
      let value = waiter.await.unwrap().unwrap();
      assert_eq!(*value.downcast::<u32>().unwrap(), 7);
    }
  }

  #[tokio::test]
  async fn settled_future_is_ready_immediately() {
    let flight = FetchFuture::new();
    flight.complete(Err(SyncError::InvalidInterval));
    assert!(matches!((&flight).await, Err(SyncError::InvalidInterval)));
  }
}
