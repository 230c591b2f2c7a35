//! Authentication state shared with the API client.
//!
//! This module provides:
//! - `AuthState`: the process-wide bearer token read by the executor at call time
//! - `Session`: token persistence between CLI invocations, with expiry
//!
//! How a token is obtained is up to the caller (login mutation, environment).

pub mod session;
pub mod state;

pub use session::{Session, SessionData};
pub use state::AuthState;
