//! The query store: cache entries, tag index, in-flight table and
//! subscription bookkeeping behind one lock.
//!
//! Lifecycle of a key:
//!
//! 1. `subscribe` creates the entry (if needed), bumps the subscriber count
//!    and starts a request unless the data is fresh or one is already running.
//! 2. Every request gets a store-wide generation number. Its completion is
//!    applied only if it is still the latest request issued for that key.
//! 3. A successful mutation resolves its invalidation tags through the tag
//!    index, marks the hits stale and refetches the ones with subscribers.
//! 4. When the last subscriber leaves, an idle timer starts; expiry removes
//!    the entry and its tags unless someone subscribed in the meantime.
//!
//! The lock is a plain mutex that is never held across an `.await`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::{ApiError, FetchExecutor};

use super::config::StoreConfig;
use super::endpoint::{EndpointDescriptor, EndpointKind, EndpointRegistry};
use super::entry::{decode, CacheEntry, EntrySnapshot};
use super::error::CacheError;
use super::key::CacheKey;
use super::subscription::Subscription;
use super::tag::Tag;
use super::tag_index::TagIndex;

/// Result shared by every consumer of one request.
pub type FetchOutcome = Result<Arc<Value>, ApiError>;

type SharedFetch = Shared<BoxFuture<'static, FetchOutcome>>;

struct InFlight {
    generation: u64,
    fetch: SharedFetch,
}

struct Slot {
    entry: CacheEntry,
    args: Value,
    descriptor: Arc<EndpointDescriptor>,
    /// Generation of the most recently issued request for this key.
    latest_generation: u64,
    /// Latest issued generation at the time of the last invalidation.
    invalidated_at: Option<u64>,
    eviction: Option<JoinHandle<()>>,
    eviction_epoch: u64,
    notify: watch::Sender<EntrySnapshot>,
}

impl Slot {
    fn new(key: &CacheKey, args: Value, descriptor: Arc<EndpointDescriptor>) -> Self {
        let entry = CacheEntry::new();
        let (notify, _) = watch::channel(entry.snapshot(key));
        Self {
            entry,
            args,
            descriptor,
            latest_generation: 0,
            invalidated_at: None,
            eviction: None,
            eviction_epoch: 0,
            notify,
        }
    }

    fn publish(&self, key: &CacheKey) {
        self.notify.send_replace(self.entry.snapshot(key));
    }

    fn cancel_eviction(&mut self) {
        self.eviction_epoch += 1;
        if let Some(handle) = self.eviction.take() {
            handle.abort();
        }
    }

    fn mark_stale(&mut self, key: &CacheKey) {
        self.entry.stale = true;
        self.invalidated_at = Some(self.latest_generation);
        self.publish(key);
    }
}

#[derive(Default)]
struct StoreState {
    entries: HashMap<CacheKey, Slot>,
    tags: TagIndex,
    in_flight: HashMap<CacheKey, InFlight>,
    next_generation: u64,
    disposed: bool,
}

struct StoreInner {
    executor: Arc<dyn FetchExecutor>,
    registry: Arc<EndpointRegistry>,
    config: StoreConfig,
    state: Mutex<StoreState>,
}

/// Normalized query cache with tag-based invalidation.
///
/// Clone is cheap; clones share the same cache. Tests build a fresh store
/// per case with [`QueryStore::init`].
#[derive(Clone)]
pub struct QueryStore {
    inner: Arc<StoreInner>,
}

impl QueryStore {
    /// Create a store over an executor and a frozen endpoint table.
    pub fn init(
        executor: Arc<dyn FetchExecutor>,
        registry: EndpointRegistry,
        config: StoreConfig,
    ) -> Self {
        debug!(
            executor = executor.name(),
            endpoints = registry.len(),
            keep_unused_secs = config.keep_unused_data_for.as_secs(),
            "Query store initialized"
        );
        Self {
            inner: Arc::new(StoreInner {
                executor,
                registry: Arc::new(registry),
                config,
                state: Mutex::new(StoreState::default()),
            }),
        }
    }

    /// Drop all entries, tags and pending timers. Later calls fail with
    /// `CacheError::Disposed`; open subscriptions see their channel close.
    pub fn dispose(&self) {
        let mut state = self.inner.lock();
        if state.disposed {
            return;
        }
        state.disposed = true;
        for slot in state.entries.values_mut() {
            slot.cancel_eviction();
        }
        let entries = state.entries.len();
        state.entries.clear();
        state.tags.clear();
        state.in_flight.clear();
        info!(entries, "Query store disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.lock().disposed
    }

    pub fn registry(&self) -> &EndpointRegistry {
        &self.inner.registry
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    // ===== Queries =====

    /// Mount a consumer on a query. Must be called within a Tokio runtime.
    ///
    /// Starts a request when the entry is missing, errored or stale and no
    /// request for the key is already running.
    pub fn subscribe<A: Serialize>(&self, endpoint: &str, args: A) -> Result<Subscription, CacheError> {
        let descriptor = self.inner.registry.expect(endpoint, EndpointKind::Query)?;
        let args = to_args(args)?;
        let key = CacheKey::new(endpoint, &args);

        let mut state = self.inner.lock();
        if state.disposed {
            return Err(CacheError::Disposed);
        }

        let in_flight = state.in_flight.contains_key(&key);
        let slot = state
            .entries
            .entry(key.clone())
            .or_insert_with(|| Slot::new(&key, args, descriptor));
        slot.cancel_eviction();
        slot.entry.subscriber_count += 1;
        let needs_fetch = slot.entry.needs_fetch() && !in_flight;
        let subscribers = slot.entry.subscriber_count;
        let receiver = slot.notify.subscribe();

        if needs_fetch {
            self.inner.start_fetch(&mut state, &key);
        } else {
            if let Some(slot) = state.entries.get(&key) {
                slot.publish(&key);
            }
            debug!(key = %key, subscribers, joined = in_flight, "Subscribed to cached entry");
        }

        Ok(Subscription::new(self.clone(), key, receiver))
    }

    /// One-shot read: subscribe, wait for the entry to settle, release.
    pub async fn query<A: Serialize>(&self, endpoint: &str, args: A) -> Result<Arc<Value>, CacheError> {
        let mut subscription = self.subscribe(endpoint, args)?;
        subscription.settled().await
    }

    /// Typed variant of [`QueryStore::query`].
    pub async fn query_as<T: DeserializeOwned, A: Serialize>(
        &self,
        endpoint: &str,
        args: A,
    ) -> Result<T, CacheError> {
        let value = self.query(endpoint, args).await?;
        decode(&value)
    }

    /// Write data for a query without a request, as if it had just been
    /// fetched. Any request still in flight for the key is superseded.
    pub fn upsert<A: Serialize>(&self, endpoint: &str, args: A, data: Value) -> Result<(), CacheError> {
        let descriptor = self.inner.registry.expect(endpoint, EndpointKind::Query)?;
        let args = to_args(args)?;
        let key = CacheKey::new(endpoint, &args);

        let mut state = self.inner.lock();
        if state.disposed {
            return Err(CacheError::Disposed);
        }
        state.next_generation += 1;
        let generation = state.next_generation;
        state.in_flight.remove(&key);

        let StoreState { entries, tags, .. } = &mut *state;
        let slot = entries
            .entry(key.clone())
            .or_insert_with(|| Slot::new(&key, args, descriptor));
        slot.latest_generation = generation;
        slot.invalidated_at = None;
        tags.replace(&key, slot.descriptor.provided_tags(&data, &slot.args));
        slot.entry.apply_success(Arc::new(data), false);
        slot.publish(&key);

        let idle = slot.entry.subscriber_count == 0 && slot.eviction.is_none();
        drop(state);
        if idle {
            self.inner.schedule_eviction(&key);
        }
        debug!(key = %key, generation, "Entry upserted");
        Ok(())
    }

    /// Force a new request for a cached key, joining one already running.
    pub fn refetch(&self, key: &CacheKey) -> Result<(), CacheError> {
        let mut state = self.inner.lock();
        if state.disposed {
            return Err(CacheError::Disposed);
        }
        if !state.entries.contains_key(key) {
            return Err(CacheError::NotCached(key.clone()));
        }
        if !state.in_flight.contains_key(key) {
            self.inner.start_fetch(&mut state, key);
        }
        Ok(())
    }

    // ===== Mutations =====

    /// Run a mutation. On success its invalidation tags are dispatched; on
    /// failure nothing is invalidated and the error is returned.
    pub async fn mutate<A: Serialize>(&self, endpoint: &str, args: A) -> Result<Arc<Value>, CacheError> {
        let descriptor = self.inner.registry.expect(endpoint, EndpointKind::Mutation)?;
        let args = to_args(args)?;
        if self.is_disposed() {
            return Err(CacheError::Disposed);
        }

        let request = (descriptor.request)(&args)?;
        debug!(endpoint, method = request.method.as_str(), path = %request.display_path(), "Running mutation");

        match self.inner.executor.execute(request).await {
            Ok(result) => {
                let tags = descriptor.invalidated_tags(&result, &args);
                if !tags.is_empty() {
                    let invalidated = self.invalidate_tags(&tags);
                    info!(endpoint, invalidated, "Mutation succeeded");
                } else {
                    info!(endpoint, "Mutation succeeded");
                }
                Ok(Arc::new(result))
            }
            Err(err) => {
                warn!(endpoint, error = %err, "Mutation failed, nothing invalidated");
                Err(err.into())
            }
        }
    }

    /// Typed variant of [`QueryStore::mutate`].
    pub async fn mutate_as<T: DeserializeOwned, A: Serialize>(
        &self,
        endpoint: &str,
        args: A,
    ) -> Result<T, CacheError> {
        let value = self.mutate(endpoint, args).await?;
        decode(&value)
    }

    // ===== Invalidation =====

    /// Mark every entry matched by `tags` stale and refetch the subscribed
    /// ones. Returns the number of entries marked.
    pub fn invalidate_tags(&self, tags: &[Tag]) -> usize {
        let mut state = self.inner.lock();
        if state.disposed {
            return 0;
        }
        let keys = state.tags.resolve(tags);
        for key in &keys {
            self.inner.invalidate_locked(&mut state, key);
        }
        debug!(
            tags = ?tags.iter().map(ToString::to_string).collect::<Vec<_>>(),
            entries = keys.len(),
            "Tags invalidated"
        );
        keys.len()
    }

    /// Mark one entry stale. Data stays visible until the refetch lands.
    /// Returns false when the key is not cached.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        let mut state = self.inner.lock();
        if state.disposed || !state.entries.contains_key(key) {
            return false;
        }
        self.inner.invalidate_locked(&mut state, key);
        true
    }

    // ===== Inspection =====

    pub fn get(&self, key: &CacheKey) -> Option<EntrySnapshot> {
        let state = self.inner.lock();
        state.entries.get(key).map(|slot| slot.entry.snapshot(key))
    }

    /// Snapshot of the entry for `(endpoint, args)`, if cached.
    pub fn get_entry<A: Serialize>(&self, endpoint: &str, args: A) -> Result<Option<EntrySnapshot>, CacheError> {
        let args = to_args(args)?;
        Ok(self.get(&CacheKey::new(endpoint, &args)))
    }

    /// All entries, ordered by key.
    pub fn entries(&self) -> Vec<EntrySnapshot> {
        let state = self.inner.lock();
        let mut snapshots: Vec<EntrySnapshot> = state
            .entries
            .iter()
            .map(|(key, slot)| slot.entry.snapshot(key))
            .collect();
        snapshots.sort_by(|a, b| a.key.cmp(&b.key));
        snapshots
    }

    pub fn tags_for(&self, key: &CacheKey) -> Vec<Tag> {
        self.inner.lock().tags.tags_for(key).to_vec()
    }

    pub fn in_flight_count(&self) -> usize {
        self.inner.lock().in_flight.len()
    }

    /// The request currently running for `key`, for joining.
    pub fn in_flight(&self, key: &CacheKey) -> Option<impl std::future::Future<Output = FetchOutcome>> {
        self.inner
            .lock()
            .in_flight
            .get(key)
            .map(|flight| flight.fetch.clone())
    }

    // ===== Subscription bookkeeping =====

    /// Called when a subscription is dropped.
    pub(crate) fn release(&self, key: &CacheKey) {
        let mut state = self.inner.lock();
        let Some(slot) = state.entries.get_mut(key) else {
            return;
        };
        slot.entry.subscriber_count = slot.entry.subscriber_count.saturating_sub(1);
        let remaining = slot.entry.subscriber_count;
        slot.publish(key);
        drop(state);

        debug!(key = %key, remaining, "Unsubscribed");
        if remaining == 0 {
            self.inner.schedule_eviction(key);
        }
    }
}

impl StoreInner {
    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Issue a request for `key`, replacing any in-flight entry for it.
    fn start_fetch(self: &Arc<Self>, state: &mut StoreState, key: &CacheKey) {
        state.next_generation += 1;
        let generation = state.next_generation;

        let Some(slot) = state.entries.get_mut(key) else {
            return;
        };
        slot.latest_generation = generation;
        slot.entry.begin_fetch();
        slot.publish(key);

        let request = (slot.descriptor.request)(&slot.args);
        let executor = Arc::clone(&self.executor);
        let store = Arc::downgrade(self);
        let fetch_key = key.clone();

        let fetch: SharedFetch = async move {
            let outcome = match request {
                Ok(request) => {
                    debug!(key = %fetch_key, generation, path = %request.display_path(), "Fetching");
                    executor.execute(request).await.map(Arc::new)
                }
                Err(err) => Err(err),
            };
            Self::complete(&store, &fetch_key, generation, &outcome);
            outcome
        }
        .boxed()
        .shared();

        state.in_flight.insert(
            key.clone(),
            InFlight {
                generation,
                fetch: fetch.clone(),
            },
        );
        // Drive the request to completion even if every subscriber leaves.
        tokio::spawn(fetch);
    }

    /// Apply a finished request, unless a newer one was issued since.
    fn complete(store: &Weak<Self>, key: &CacheKey, generation: u64, outcome: &FetchOutcome) {
        let Some(inner) = store.upgrade() else {
            return;
        };
        let mut state = inner.lock();

        if state
            .in_flight
            .get(key)
            .is_some_and(|flight| flight.generation == generation)
        {
            state.in_flight.remove(key);
        }

        let StoreState { entries, tags, .. } = &mut *state;
        let Some(slot) = entries.get_mut(key) else {
            debug!(key = %key, generation, "Completion for evicted entry dropped");
            return;
        };
        if slot.latest_generation != generation {
            warn!(
                key = %key,
                generation,
                latest = slot.latest_generation,
                "Discarding superseded completion"
            );
            return;
        }

        // Either outcome answers every invalidation issued before this
        // request; only a later one keeps the entry stale.
        let stale = slot.invalidated_at.is_some_and(|at| at >= generation);
        if !stale {
            slot.invalidated_at = None;
        }
        match outcome {
            Ok(data) => {
                tags.replace(key, slot.descriptor.provided_tags(data, &slot.args));
                slot.entry.apply_success(Arc::clone(data), stale);
                debug!(key = %key, generation, stale, "Fetch succeeded");
            }
            Err(err) => {
                slot.entry.apply_error(err.clone(), stale);
                warn!(key = %key, generation, stale, error = %err, "Fetch failed");
            }
        }
        slot.publish(key);

        // Invalidated while this request was running with nobody mounted,
        // and someone has mounted since.
        if slot.entry.stale && slot.entry.subscriber_count > 0 {
            inner.start_fetch(&mut state, key);
        }
    }

    fn invalidate_locked(self: &Arc<Self>, state: &mut StoreState, key: &CacheKey) {
        let Some(slot) = state.entries.get_mut(key) else {
            return;
        };
        slot.mark_stale(key);
        if slot.entry.subscriber_count > 0 {
            self.start_fetch(state, key);
        } else {
            debug!(key = %key, "Marked stale, refetch deferred until next subscribe");
        }
    }

    /// Start the idle timer for an entry that just lost its last subscriber.
    fn schedule_eviction(self: &Arc<Self>, key: &CacheKey) {
        let delay = self.config.keep_unused_data_for;
        let mut state = self.lock();
        let Some(slot) = state.entries.get_mut(key) else {
            return;
        };
        if slot.entry.subscriber_count > 0 {
            return;
        }
        slot.cancel_eviction();
        let epoch = slot.eviction_epoch;

        let runtime = tokio::runtime::Handle::try_current();
        match runtime {
            Ok(handle) if !delay.is_zero() => {
                let store = Arc::downgrade(self);
                let evict_key = key.clone();
                slot.eviction = Some(handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    if let Some(inner) = store.upgrade() {
                        inner.evict_if_idle(&evict_key, epoch);
                    }
                }));
            }
            _ => {
                drop(state);
                self.evict_if_idle(key, epoch);
            }
        }
    }

    fn evict_if_idle(&self, key: &CacheKey, epoch: u64) {
        let mut state = self.lock();
        let idle = state
            .entries
            .get(key)
            .is_some_and(|slot| slot.entry.subscriber_count == 0 && slot.eviction_epoch == epoch);
        if !idle {
            return;
        }
        state.entries.remove(key);
        state.tags.remove(key);
        state.in_flight.remove(key);
        debug!(key = %key, "Evicted idle entry");
    }
}

fn to_args<A: Serialize>(args: A) -> Result<Value, CacheError> {
    serde_json::to_value(args).map_err(|e| CacheError::Serialization(e.to_string()))
}
