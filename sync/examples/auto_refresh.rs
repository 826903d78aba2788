use fibre_sync::SyncCache;
use std::sync::{
  atomic::{AtomicU32, Ordering},
  Arc,
};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
#[error("player list request timed out")]
struct Timeout;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  let cache = SyncCache::new()?;
  let polls = Arc::new(AtomicU32::new(0));

  let fetcher = {
    let polls = polls.clone();
    move || {
      let n = polls.fetch_add(1, Ordering::SeqCst) + 1;
      async move {
        // Every third poll fails; the schedule keeps going.
        if n % 3 == 0 {
          Err(Timeout)
        } else {
          Ok(format!("{} players online", n * 2))
        }
      }
    }
  };

  cache.subscribe("players", |summary: Arc<String>| {
    println!("[Subscriber] {}", summary);
  });
  cache.start_auto_refresh("players", fetcher, Duration::from_millis(250))?;

  tokio::time::sleep(Duration::from_secs(2)).await;
  cache.stop_auto_refresh("players");

  println!("Polls: {}", polls.load(Ordering::SeqCst));
  println!("Latest: {:?}", cache.get_cached::<String>("players"));
  println!("Cache metrics: {:#?}", cache.metrics());
  Ok(())
}
