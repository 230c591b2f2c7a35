//! REST API client module for the health-tracking backend.
//!
//! This module provides the `FetchExecutor` seam used by the query cache,
//! its `reqwest` implementation `ApiClient`, the `RequestSpec` that endpoint
//! descriptors build, and the `ApiError` taxonomy.
//!
//! Requests carry a bearer token from `AuthState` when one is present.

pub mod client;
pub mod error;
pub mod executor;
pub mod request;

pub use client::ApiClient;
pub use error::ApiError;
pub use executor::FetchExecutor;
pub use request::{arg_field, arg_str, FileUpload, Method, RequestSpec};
