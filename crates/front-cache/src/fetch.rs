//! Fetch collaborator contract.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

/// Result of a fetch: the value to cache and how long to keep it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    /// The fetched bytes. Empty signals a failed fetch.
    pub value: Bytes,
    /// Time-to-live, measured from the moment the value is stored.
    pub ttl: Duration,
}

impl Fetched {
    /// Creates a new fetch result.
    pub fn new(value: impl Into<Bytes>, ttl: Duration) -> Self {
        Self {
            value: value.into(),
            ttl,
        }
    }

    /// Creates an empty result, used to report a failed fetch.
    ///
    /// Empty values are cached for `ttl` like any other value.
    pub fn empty(ttl: Duration) -> Self {
        Self {
            value: Bytes::new(),
            ttl,
        }
    }

    /// Returns true if the fetched value is empty.
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

/// Supplies values for keys that are not cached.
///
/// A `Fetcher` may be called concurrently with different keys. With the
/// default [`InsertPolicy`](crate::InsertPolicy) it is never called
/// concurrently with the same key.
#[async_trait]
pub trait Fetcher: Send + Sync + 'static {
    /// Fetches the value for `key`.
    async fn fetch(&self, key: &str) -> Fetched;
}

#[async_trait]
impl<F, Fut> Fetcher for F
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Fetched> + Send + 'static,
{
    async fn fetch(&self, key: &str) -> Fetched {
        (self)(key.to_string()).await
    }
}
