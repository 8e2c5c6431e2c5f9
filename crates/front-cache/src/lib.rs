//! # Front Cache
//!
//! Concurrent in-memory cache mapping string keys to byte values.
//!
//! Values are populated lazily through a [`Fetcher`], which returns both the
//! value and its time-to-live. Each entry is evicted once its TTL has elapsed,
//! counted from the moment it was populated.
//!
//! ## Features
//!
//! - At most one fetch in flight per key; concurrent callers wait for it
//! - Per-entry locking, so slow fetches never block other keys
//! - A single background task per cache drives all expirations
//! - Explicit removal and graceful shutdown of pending timers
//! - Metrics via the `metrics` crate and structured logging via `tracing`
//!
//! ## Example
//!
//! ```ignore
//! use front_cache::{Cache, Fetched};
//! use std::time::Duration;
//!
//! let cache = Cache::new(|path: String| async move {
//!     match download(&path).await {
//!         Ok(body) => Fetched::new(body, Duration::from_secs(3600)),
//!         Err(_) => Fetched::empty(Duration::from_secs(3600)),
//!     }
//! });
//!
//! let (body, hit) = cache.get("/index.html").await;
//! ```

pub mod cache;
pub mod config;
mod entry;
pub mod error;
mod expiry;
pub mod fetch;
pub mod metrics;

// Re-exports
pub use cache::Cache;
pub use crate::config::{CacheConfig, CacheConfigBuilder, InsertPolicy};
pub use error::CacheError;
pub use fetch::{Fetched, Fetcher};
pub use crate::metrics::{CacheMetrics, EvictionReason, register_cache_metrics};
