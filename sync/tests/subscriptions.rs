mod common;

use common::*;
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
struct BanList {
  version: u32,
  players: Vec<String>,
}

fn ban_list(version: u32, players: &[&str]) -> BanList {
  BanList {
    version,
    players: players.iter().map(|p| p.to_string()).collect(),
  }
}

#[tokio::test]
async fn test_subscribe_does_not_fetch() {
  let (cache, _clock) = build_test_cache();
  let (seen, sink) = recorder::<BanList>();

  let subscription = cache.subscribe("bans", sink);
  assert_eq!(subscription.key(), "bans");
  assert_eq!(cache.subscriber_count("bans"), 1);
  assert_eq!(cache.metrics().fetches_started, 0);
  assert!(seen.lock().is_empty());
}

#[tokio::test]
async fn test_unsubscribe_removes_only_that_registration() {
  let (cache, clock) = build_test_cache();
  let calls = Arc::new(AtomicUsize::new(0));
  let (first_seen, first) = recorder::<u32>();
  let (second_seen, second) = recorder::<u32>();
  let (other_seen, other) = recorder::<u32>();

  let first = cache.subscribe("online", first);
  let _second = cache.subscribe("online", second);
  let _other = cache.subscribe("peak", other);

  cache.get("online", counted(&calls, 1u32), &policy()).await.unwrap();
  first.unsubscribe();
  first.unsubscribe();
  assert_eq!(cache.subscriber_count("online"), 1);

  clock.advance(ms(6000));
  cache.get("online", counted(&calls, 2u32), &policy()).await.unwrap();
  cache.get("peak", counted(&calls, 9u32), &policy()).await.unwrap();

  assert_eq!(*first_seen.lock(), vec![1]);
  assert_eq!(*second_seen.lock(), vec![1, 2]);
  assert_eq!(*other_seen.lock(), vec![9]);
}

#[tokio::test]
async fn test_optimistic_update_on_missing_key_is_a_noop() {
  let (cache, _clock) = build_test_cache();
  let (seen, sink) = recorder::<BanList>();
  cache.subscribe("bans", sink);

  let applied = cache
    .optimistic_update::<BanList, _>("bans", |list| list.clone())
    .unwrap();
  assert!(!applied);
  assert!(cache.get_cached::<BanList>("bans").is_none());
  assert!(seen.lock().is_empty());
}

#[tokio::test]
async fn test_optimistic_update_applies_and_notifies_without_fetching() {
  let (cache, clock) = build_test_cache();
  let calls = Arc::new(AtomicUsize::new(0));
  let (seen, sink) = recorder::<BanList>();

  cache.get("bans", counted(&calls, ban_list(1, &["griefer"])), &policy()).await.unwrap();
  cache.subscribe("bans", sink);
  clock.advance(ms(3000));

  let applied = cache
    .optimistic_update("bans", |list: &BanList| {
      let mut next = list.clone();
      next.players.push("spammer".to_string());
      next
    })
    .unwrap();
  assert!(applied);

  let expected = ban_list(1, &["griefer", "spammer"]);
  assert_eq!(cache.get_cached::<BanList>("bans").as_deref(), Some(&expected));
  assert_eq!(*seen.lock(), vec![expected]);
  assert_eq!(calls.load(Ordering::SeqCst), 1);

  let info = cache.entry_info("bans").unwrap();
  assert_eq!(info.age, ms(0), "optimistic write counts as just fetched");
  assert!(!info.stale);

  // Now fresh again, so no refresh is triggered.
  cache.get("bans", counted(&calls, ban_list(2, &[])), &policy()).await.unwrap();
  assert_eq!(calls.load(Ordering::SeqCst), 1);
  assert_eq!(cache.metrics().optimistic_updates, 1);
}

#[tokio::test]
async fn test_optimistic_update_with_wrong_type_is_an_error() {
  let (cache, _clock) = build_test_cache();
  let calls = Arc::new(AtomicUsize::new(0));
  cache.get("count", counted(&calls, 3u32), &policy()).await.unwrap();

  let result = cache.optimistic_update("count", |n: &i64| n + 1);
  assert!(result.is_err());
  assert_eq!(cache.get_cached::<u32>("count").as_deref(), Some(&3));
}

#[tokio::test]
async fn test_cleanup_removes_all_subscriptions_and_is_idempotent() {
  let (cache, clock) = build_test_cache();
  let calls = Arc::new(AtomicUsize::new(0));
  let (seen, sink) = recorder::<u8>();
  cache.subscribe("a", sink);
  cache.get("a", counted(&calls, 1u8), &policy()).await.unwrap();

  cache.cleanup();
  cache.cleanup();
  assert_eq!(cache.subscriber_count("a"), 0);
  assert_eq!(cache.get_cached::<u8>("a").as_deref(), Some(&1), "entries survive cleanup");

  clock.advance(ms(6000));
  cache.get("a", counted(&calls, 2u8), &policy()).await.unwrap();
  assert_eq!(*seen.lock(), vec![1]);
}

#[tokio::test]
async fn test_panicking_subscriber_does_not_block_others() {
  let (cache, _clock) = build_test_cache();
  let calls = Arc::new(AtomicUsize::new(0));
  let (seen, sink) = recorder::<u8>();

  cache.subscribe("a", |_: Arc<u8>| {
    panic!("bad subscriber");
  });
  cache.subscribe("a", sink);

  let value = cache.get("a", counted(&calls, 4u8), &policy()).await.unwrap();
  assert_eq!(*value, 4);
  assert_eq!(*seen.lock(), vec![4]);
}
