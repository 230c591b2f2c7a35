//! vitalsdesk core - typed client and query cache for the health-tracking backend.
//!
//! - `api`: HTTP fetch executor and request descriptions
//! - `cache`: the tag-invalidated `QueryStore`
//! - `services`: endpoint tables and the typed `VitalsApi`
//! - `auth`, `config`: token state, session and settings persistence

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod models;
pub mod services;
pub mod utils;

pub use api::{ApiClient, ApiError, FetchExecutor, Method, RequestSpec};
pub use auth::{AuthState, Session, SessionData};
pub use cache::{CacheError, CacheKey, EntrySnapshot, QueryStatus, QueryStore, StoreConfig, Subscription, Tag};
pub use config::Config;
pub use services::VitalsApi;
