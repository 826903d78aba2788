//! A stale-while-revalidate synchronization cache that sits between consumers
//! and slow, fallible, asynchronous data sources.
//!
//! # Features
//! - **Stale-While-Revalidate**: Values inside their fresh window are served
//!   directly; values inside their stale window are served while a background
//!   refresh runs; older values are refetched before returning.
//! - **Single-Flight**: Concurrent reads of the same key share one fetch.
//! - **Subscribers**: Callbacks receive every new value for a key.
//! - **Optimistic Updates**: Local, fetch-free edits of a cached value.
//! - **Auto-Refresh**: Per-key repeating fetches, cancellable at any time.
//! - **Observability**: Exposes counters for hits, fetches and failures, and
//!   logs through `tracing`.
//!
//! # Example
//!
//! ```no_run
//! use fibre_sync::{FetchPolicy, SyncCache};
//! use std::time::Duration;
//!
//! # #[derive(Debug)] struct Unreachable;
//! # impl std::fmt::Display for Unreachable {
//! #   fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str("unreachable") }
//! # }
//! # impl std::error::Error for Unreachable {}
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let cache = SyncCache::new()?;
//! let policy = FetchPolicy::new(Duration::from_secs(1), Duration::from_secs(5))?;
//!
//! let players = cache
//!   .get("players", || async { Ok::<_, Unreachable>(vec!["alice", "bob"]) }, &policy)
//!   .await?;
//! assert_eq!(players.len(), 2);
//! # Ok(())
//! # }
//! ```

// Public modules that form the API
pub mod builder;
pub mod error;
pub mod handles;
pub mod metrics;
pub mod policy;
pub mod runtime;
pub mod subscriber;
pub mod time;

// Internal, crate-only modules
mod entry;
mod flight;
mod shared;
mod task;

// Re-export the primary user-facing types for convenience
pub use builder::SyncCacheBuilder;
pub use entry::EntryInfo;
pub use error::{BuildError, PolicyError, SharedError, SyncError};
pub use handles::SyncCache;
pub use metrics::MetricsSnapshot;
pub use policy::FetchPolicy;
pub use runtime::TaskSpawner;
#[cfg(feature = "tokio")]
pub use runtime::TokioSpawner;
pub use subscriber::Subscription;
pub use time::{Clock, ManualClock, SystemClock};
