//! Cache-then-reload layer over the persistent store.

use std::future::Future;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, instrument};

use self::store::Store;
use crate::prelude::*;

pub mod locations;
pub mod roster;
pub mod store;

pub const USERS_TTL: StdDuration = StdDuration::from_millis(300_000);
pub const LOCATIONS_TTL: StdDuration = StdDuration::from_millis(30_000);

/// Decides, per resource key, whether to serve the stored payload or to call
/// the getter, based on the `{key}_expires` timestamp (epoch milliseconds).
#[derive(Clone)]
pub struct Freshness<S> {
    store: S,
}

impl<S: Store> Freshness<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the cached resource, refetching it through the getter when
    /// `force` is set, the expiry is absent or past, or the payload is
    /// missing despite a valid expiry.
    ///
    /// A getter failure degrades to `T::default()` and leaves the expiry
    /// unset, so the next call refetches. Callers never observe an error
    /// from the getter itself.
    #[instrument(skip_all, fields(key = key, force = force))]
    pub async fn get<T, G, Fut>(&self, key: &str, ttl: StdDuration, force: bool, getter: G) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Default,
        G: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if force {
            return self.refetch(key, ttl, getter).await;
        }
        match self.expires_at(key).await? {
            Some(expires_at) if expires_at > Utc::now().timestamp_millis() => {
                match self.store.read(key).await? {
                    Some(blob) => {
                        debug!(key, "cache hit");
                        Ok(rmp_serde::from_slice(&blob)?)
                    }
                    // Valid expiry but no payload: treat as a miss.
                    None => self.refetch(key, ttl, getter).await,
                }
            }
            _ => self.refetch(key, ttl, getter).await,
        }
    }

    async fn refetch<T, G, Fut>(&self, key: &str, ttl: StdDuration, getter: G) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Default,
        G: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let expires_key = expires_key(key);
        self.store.remove(&expires_key).await?;

        let value = match getter().await {
            Ok(value) => value,
            Err(error) => {
                error!(key, "fetch failed: {:#}", error);
                return Ok(T::default());
            }
        };

        // The expiry goes in strictly after the payload, so a valid expiry
        // always implies a stored payload.
        self.store.write(key, rmp_serde::to_vec(&value)?).await?;
        let expires_at = Utc::now().timestamp_millis() + ttl.as_millis() as i64;
        self.store.write(&expires_key, rmp_serde::to_vec(&expires_at)?).await?;
        debug!(key, expires_at, "set cache");
        Ok(value)
    }

    async fn expires_at(&self, key: &str) -> Result<Option<i64>> {
        match self.store.read(&expires_key(key)).await? {
            Some(blob) => Ok(Some(rmp_serde::from_slice(&blob)?)),
            None => Ok(None),
        }
    }
}

fn expires_key(key: &str) -> String {
    format!("{}_expires", key)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::store::MemoryStore;
    use super::*;

    fn counting_getter(
        calls: &Arc<AtomicUsize>,
        value: Vec<i32>,
    ) -> impl FnOnce() -> futures::future::Ready<Result<Vec<i32>>> {
        let calls = Arc::clone(calls);
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            futures::future::ready(Ok(value))
        }
    }

    #[tokio::test]
    async fn force_fetches_once_and_sets_expiry_ok() -> Result {
        let freshness = Freshness::new(MemoryStore::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let started_at = Utc::now().timestamp_millis();

        let value = freshness
            .get("users", USERS_TTL, true, counting_getter(&calls, vec![1]))
            .await?;

        assert_eq!(value, vec![1]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let expires_at = freshness.expires_at("users").await?.unwrap();
        assert!(expires_at >= started_at + USERS_TTL.as_millis() as i64);
        Ok(())
    }

    #[tokio::test]
    async fn fresh_cache_serves_without_fetch_ok() -> Result {
        let freshness = Freshness::new(MemoryStore::default());
        let calls = Arc::new(AtomicUsize::new(0));

        freshness
            .get("users", USERS_TTL, true, counting_getter(&calls, vec![1]))
            .await?;
        let value = freshness
            .get("users", USERS_TTL, false, counting_getter(&calls, vec![2]))
            .await?;

        assert_eq!(value, vec![1]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn past_expiry_refetches_ok() -> Result {
        let store = MemoryStore::default();
        store.write("users", rmp_serde::to_vec(&vec![1])?).await?;
        store.write("users_expires", rmp_serde::to_vec(&0_i64)?).await?;
        let freshness = Freshness::new(store);
        let calls = Arc::new(AtomicUsize::new(0));

        let value = freshness
            .get("users", USERS_TTL, false, counting_getter(&calls, vec![2]))
            .await?;

        assert_eq!(value, vec![2]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn missing_expiry_refetches_ok() -> Result {
        let store = MemoryStore::default();
        store.write("users", rmp_serde::to_vec(&vec![1])?).await?;
        let freshness = Freshness::new(store);
        let calls = Arc::new(AtomicUsize::new(0));

        let value = freshness
            .get("users", USERS_TTL, false, counting_getter(&calls, vec![2]))
            .await?;

        assert_eq!(value, vec![2]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn missing_payload_refetches_ok() -> Result {
        let store = MemoryStore::default();
        let expires_at = Utc::now().timestamp_millis() + 60_000;
        store.write("users_expires", rmp_serde::to_vec(&expires_at)?).await?;
        let freshness = Freshness::new(store);
        let calls = Arc::new(AtomicUsize::new(0));

        let value = freshness
            .get("users", USERS_TTL, false, counting_getter(&calls, vec![2]))
            .await?;

        assert_eq!(value, vec![2]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn failed_fetch_degrades_to_empty_and_is_not_cached_ok() -> Result {
        let freshness = Freshness::new(MemoryStore::default());

        let value: Vec<i32> = freshness
            .get("user_5_locations", LOCATIONS_TTL, false, || {
                futures::future::ready(Err(anyhow!("connection refused")))
            })
            .await?;

        assert!(value.is_empty());
        assert!(freshness.expires_at("user_5_locations").await?.is_none());

        // The next call must refetch.
        let calls = Arc::new(AtomicUsize::new(0));
        freshness
            .get("user_5_locations", LOCATIONS_TTL, false, counting_getter(&calls, vec![1]))
            .await?;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn empty_result_is_cached_as_valid_ok() -> Result {
        let freshness = Freshness::new(MemoryStore::default());
        let calls = Arc::new(AtomicUsize::new(0));

        let value = freshness
            .get("user_5_locations", LOCATIONS_TTL, false, counting_getter(&calls, vec![]))
            .await?;
        assert!(value.is_empty());

        let value = freshness
            .get("user_5_locations", LOCATIONS_TTL, false, counting_getter(&calls, vec![1]))
            .await?;
        assert!(value.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        Ok(())
    }
}
