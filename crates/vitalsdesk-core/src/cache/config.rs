use std::time::Duration;

/// Default idle time before an unsubscribed entry is evicted.
pub const DEFAULT_KEEP_UNUSED_DATA_FOR: Duration = Duration::from_secs(60);

/// Tuning for a `QueryStore`.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// How long an entry with no subscribers is kept before eviction.
    ///
    /// A new subscriber within this window reuses the cached data and cancels
    /// the eviction. Zero evicts as soon as the last subscriber leaves.
    pub keep_unused_data_for: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            keep_unused_data_for: DEFAULT_KEEP_UNUSED_DATA_FOR,
        }
    }
}

impl StoreConfig {
    #[must_use]
    pub const fn new(keep_unused_data_for: Duration) -> Self {
        Self {
            keep_unused_data_for,
        }
    }
}
