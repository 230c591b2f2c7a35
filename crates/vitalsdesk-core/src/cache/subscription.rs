use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::watch;

use super::entry::{decode, EntrySnapshot, QueryStatus};
use super::error::CacheError;
use super::key::CacheKey;
use super::store::QueryStore;

/// A mounted consumer of one cache entry.
///
/// Holding the handle keeps the entry alive and makes invalidations refetch
/// it. Dropping the handle unsubscribes; a request already running keeps
/// going and still updates the cache, but this handle no longer sees it.
pub struct Subscription {
    store: QueryStore,
    key: CacheKey,
    receiver: watch::Receiver<EntrySnapshot>,
}

impl Subscription {
    pub(crate) fn new(
        store: QueryStore,
        key: CacheKey,
        receiver: watch::Receiver<EntrySnapshot>,
    ) -> Self {
        Self {
            store,
            key,
            receiver,
        }
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Latest state of the entry.
    pub fn snapshot(&self) -> EntrySnapshot {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change to the entry and return it.
    pub async fn changed(&mut self) -> Result<EntrySnapshot, CacheError> {
        self.receiver
            .changed()
            .await
            .map_err(|_| CacheError::Disposed)?;
        Ok(self.receiver.borrow_and_update().clone())
    }

    /// Wait until no request is running and the entry holds data or an error.
    ///
    /// Resolves to the data on success. An error state resolves to the error,
    /// even if older data is still cached.
    pub async fn settled(&mut self) -> Result<Arc<Value>, CacheError> {
        loop {
            let snapshot = self.receiver.borrow_and_update().clone();
            if snapshot.is_settled() {
                return match snapshot.status {
                    QueryStatus::Success => snapshot
                        .data
                        .ok_or_else(|| CacheError::Serialization("entry has no data".into())),
                    _ => Err(snapshot
                        .error
                        .map(CacheError::Api)
                        .unwrap_or(CacheError::Disposed)),
                };
            }
            self.receiver
                .changed()
                .await
                .map_err(|_| CacheError::Disposed)?;
        }
    }

    /// Typed variant of [`Subscription::settled`].
    pub async fn settled_as<T: DeserializeOwned>(&mut self) -> Result<T, CacheError> {
        let value = self.settled().await?;
        decode(&value)
    }

    /// Force a refetch of this entry.
    pub fn refetch(&self) -> Result<(), CacheError> {
        self.store.refetch(&self.key)
    }

    /// Explicit unsubscribe; same as dropping the handle.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.store.release(&self.key);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .finish()
    }
}
