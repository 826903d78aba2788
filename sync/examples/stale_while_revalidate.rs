use fibre_sync::{FetchPolicy, SyncCache};
use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};
use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug, Clone, PartialEq)]
struct ServerStats {
  version: usize,
  players_online: u32,
}

#[derive(Debug, thiserror::Error)]
#[error("stats backend unavailable")]
struct StatsUnavailable;

fn stats_fetcher(
  counter: &Arc<AtomicUsize>,
) -> impl FnOnce() -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<ServerStats, StatsUnavailable>> + Send>> {
  let counter = counter.clone();
  move || {
    let version = counter.fetch_add(1, Ordering::SeqCst) + 1;
    println!("[Fetcher] Loading version {}...", version);
    Box::pin(async move {
      sleep(Duration::from_millis(500)).await; // Simulate slow backend
      Ok(ServerStats {
        version,
        players_online: 10 * version as u32,
      })
    })
  }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  let fetch_counter = Arc::new(AtomicUsize::new(0));
  let cache = SyncCache::new()?;
  let policy = FetchPolicy::new(Duration::from_secs(2), Duration::from_secs(10))?;

  cache.subscribe("stats", |stats: Arc<ServerStats>| {
    println!("[Subscriber] Received: {:?}", *stats);
  });

  println!("--- Step 1: Initial Load ---");
  let value1 = cache.get("stats", stats_fetcher(&fetch_counter), &policy).await?;
  println!("Received: {:?}", *value1);
  assert_eq!(value1.version, 1);

  println!("\n--- Step 2: Cache Hit (Fresh) ---");
  let value2 = cache.get("stats", stats_fetcher(&fetch_counter), &policy).await?;
  println!("Received: {:?}", *value2);
  assert_eq!(fetch_counter.load(Ordering::Relaxed), 1);

  println!("\n--- Step 3: Wait for the fresh window to pass (3 seconds) ---");
  sleep(Duration::from_secs(3)).await;

  println!("\n--- Step 4: Stale Read ---");
  let value3 = cache.get("stats", stats_fetcher(&fetch_counter), &policy).await?;
  println!("IMMEDIATELY Received (stale): {:?}", *value3);
  assert_eq!(value3.version, 1, "Should return stale version 1 immediately");

  println!("\n--- Step 5: Wait for Background Refresh to Complete ---");
  sleep(Duration::from_secs(1)).await;
  assert_eq!(fetch_counter.load(Ordering::Relaxed), 2);

  println!("\n--- Step 6: Optimistic Update ---");
  cache.optimistic_update("stats", |stats: &ServerStats| ServerStats {
    players_online: stats.players_online + 1,
    ..stats.clone()
  })?;

  let value4 = cache.get_cached::<ServerStats>("stats").expect("entry present");
  println!("Received (refreshed + optimistic): {:?}", *value4);
  assert_eq!(value4.version, 2);
  assert_eq!(value4.players_online, 21);

  println!("\nCache metrics: {:#?}", cache.metrics());
  cache.cleanup();
  Ok(())
}
