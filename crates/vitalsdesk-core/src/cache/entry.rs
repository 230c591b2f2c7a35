use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::api::ApiError;
use crate::utils::format_age;

use super::error::CacheError;
use super::key::CacheKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Uninitialized,
    Loading,
    Success,
    Error,
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QueryStatus::Uninitialized => "uninitialized",
            QueryStatus::Loading => "loading",
            QueryStatus::Success => "success",
            QueryStatus::Error => "error",
        };
        f.write_str(name)
    }
}

/// Mutable state of one cache entry, owned by the store.
#[derive(Debug, Clone)]
pub(crate) struct CacheEntry {
    pub status: QueryStatus,
    pub data: Option<Arc<Value>>,
    pub error: Option<ApiError>,
    pub last_fetched_at: Option<DateTime<Utc>>,
    pub subscriber_count: usize,
    pub stale: bool,
    pub fetching: bool,
}

impl CacheEntry {
    pub fn new() -> Self {
        Self {
            status: QueryStatus::Uninitialized,
            data: None,
            error: None,
            last_fetched_at: None,
            subscriber_count: 0,
            stale: false,
            fetching: false,
        }
    }

    /// Whether a new subscriber should trigger a request.
    pub fn needs_fetch(&self) -> bool {
        match self.status {
            QueryStatus::Uninitialized | QueryStatus::Error => true,
            QueryStatus::Loading => !self.fetching,
            QueryStatus::Success => self.stale,
        }
    }

    /// Record the start of a request. Existing data stays visible.
    pub fn begin_fetch(&mut self) {
        self.fetching = true;
        if self.data.is_none() {
            self.status = QueryStatus::Loading;
        }
    }

    pub fn apply_success(&mut self, data: Arc<Value>, stale: bool) {
        self.status = QueryStatus::Success;
        self.data = Some(data);
        self.error = None;
        self.last_fetched_at = Some(Utc::now());
        self.stale = stale;
        self.fetching = false;
    }

    /// Record a failure. Data from an earlier success is kept.
    pub fn apply_error(&mut self, error: ApiError, stale: bool) {
        self.status = QueryStatus::Error;
        self.error = Some(error);
        self.stale = stale;
        self.fetching = false;
    }

    pub fn snapshot(&self, key: &CacheKey) -> EntrySnapshot {
        EntrySnapshot {
            key: key.clone(),
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
            last_fetched_at: self.last_fetched_at,
            subscriber_count: self.subscriber_count,
            is_stale: self.stale,
            is_fetching: self.fetching,
        }
    }
}

/// Read-only view of a cache entry handed to consumers.
#[derive(Debug, Clone)]
pub struct EntrySnapshot {
    pub key: CacheKey,
    pub status: QueryStatus,
    pub data: Option<Arc<Value>>,
    pub error: Option<ApiError>,
    pub last_fetched_at: Option<DateTime<Utc>>,
    pub subscriber_count: usize,
    pub is_stale: bool,
    pub is_fetching: bool,
}

impl EntrySnapshot {
    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }

    /// True once a request has finished and none is running.
    pub fn is_settled(&self) -> bool {
        matches!(self.status, QueryStatus::Success | QueryStatus::Error) && !self.is_fetching
    }

    /// Decode the cached value.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<Option<T>, CacheError> {
        self.data
            .as_deref()
            .map(|value| decode(value))
            .transpose()
    }

    pub fn age_minutes(&self) -> Option<i64> {
        self.last_fetched_at
            .map(|at| (Utc::now() - at).num_minutes())
    }

    pub fn age_display(&self) -> String {
        self.age_minutes()
            .map(format_age)
            .unwrap_or_else(|| "never".to_string())
    }
}

pub(crate) fn decode<T: DeserializeOwned>(value: &Value) -> Result<T, CacheError> {
    T::deserialize(value).map_err(|e| CacheError::Serialization(e.to_string()))
}
