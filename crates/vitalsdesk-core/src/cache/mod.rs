//! Client-side query cache with tag-based invalidation.
//!
//! This module provides the `QueryStore` that every list and detail view
//! reads through. Entries are keyed by endpoint name plus normalized
//! arguments, de-duplicate concurrent requests, and are refreshed when a
//! mutation invalidates one of the tags they provide.
//!
//! - `EndpointDescriptor` / `EndpointRegistry`: the immutable endpoint table
//! - `Tag` / `TagIndex`: invalidation labels and their reverse index
//! - `Subscription`: a mounted consumer; dropping it starts idle eviction

pub mod config;
pub mod endpoint;
pub mod entry;
pub mod error;
pub mod key;
pub mod store;
pub mod subscription;
pub mod tag;
pub mod tag_index;

pub use config::StoreConfig;
pub use endpoint::{EndpointDescriptor, EndpointKind, EndpointRegistry, RequestFn, TagFn};
pub use entry::{EntrySnapshot, QueryStatus};
pub use error::CacheError;
pub use key::CacheKey;
pub use store::{FetchOutcome, QueryStore};
pub use subscription::Subscription;
pub use tag::Tag;
pub use tag_index::TagIndex;
