//! This module contains the background tasks for the cache: the per-key
//! auto-refresh timers.

pub(crate) mod refresh;
