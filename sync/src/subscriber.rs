use crate::entry::ErasedValue;
use crate::shared::{CacheShared, KeyMap};

use std::any::type_name;
use std::fmt;
use std::sync::{Arc, Weak};

/// A type-erased subscriber callback.
pub(crate) type Callback = Arc<dyn Fn(&str, &ErasedValue) + Send + Sync>;

/// Per-key subscriber lists. Ids are unique for the lifetime of the registry,
/// so a registration can never appear twice.
#[derive(Default)]
pub(crate) struct SubscriberRegistry {
  next_id: u64,
  by_key: KeyMap<Vec<(u64, Callback)>>,
}

impl SubscriberRegistry {
  pub(crate) fn insert(&mut self, key: &str, callback: Callback) -> u64 {
    let id = self.next_id;
    self.next_id += 1;
    self
      .by_key
      .entry(key.to_owned())
      .or_default()
      .push((id, callback));
    id
  }

  /// Removes one registration. Returns false if it was already gone.
  pub(crate) fn remove(&mut self, key: &str, id: u64) -> bool {
    let Some(list) = self.by_key.get_mut(key) else {
      return false;
    };
    let before = list.len();
    list.retain(|(sub_id, _)| *sub_id != id);
    let removed = list.len() != before;
    if list.is_empty() {
      self.by_key.remove(key);
    }
    removed
  }

  /// Clones the callbacks for `key` so they can run without the lock held.
  pub(crate) fn callbacks(&self, key: &str) -> Vec<Callback> {
    self
      .by_key
      .get(key)
      .map(|list| list.iter().map(|(_, cb)| cb.clone()).collect())
      .unwrap_or_default()
  }

  pub(crate) fn count(&self, key: &str) -> usize {
    self.by_key.get(key).map_or(0, Vec::len)
  }

  pub(crate) fn clear(&mut self) {
    self.by_key.clear();
  }
}

/// Wraps a typed callback so it can be stored alongside callbacks of other
/// value types.
pub(crate) fn erase<T, C>(callback: C) -> Callback
where
  T: Send + Sync + 'static,
  C: Fn(Arc<T>) + Send + Sync + 'static,
{
  Arc::new(move |key: &str, value: &ErasedValue| match value.clone().downcast::<T>() {
    Ok(typed) => callback(typed),
    Err(_) => tracing::warn!(
      key = %key,
      expected = type_name::<T>(),
      "subscriber skipped: cached value has a different type"
    ),
  })
}

/// A handle to one subscriber registration, returned by `SyncCache::subscribe`.
///
/// Dropping the handle does not unsubscribe; call [`Subscription::unsubscribe`].
pub struct Subscription {
  pub(crate) shared: Weak<CacheShared>,
  pub(crate) key: String,
  pub(crate) id: u64,
}

impl Subscription {
  /// Removes exactly this registration. Calling it more than once, or after
  /// the cache was dropped or cleaned up, does nothing.
  pub fn unsubscribe(&self) {
    if let Some(shared) = self.shared.upgrade() {
      if shared.subscribers.lock().remove(&self.key, self.id) {
        tracing::debug!(key = %self.key, id = self.id, "subscriber removed");
      }
    }
  }

  pub fn key(&self) -> &str {
    &self.key
  }
}

impl fmt::Debug for Subscription {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Subscription")
      .field("key", &self.key)
      .field("id", &self.id)
      .finish()
  }
}
