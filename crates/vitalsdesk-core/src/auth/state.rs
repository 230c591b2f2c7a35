use std::sync::{Arc, PoisonError, RwLock};

/// Shared, swappable bearer token.
///
/// Clone is cheap; every clone observes the same token. The executor reads it
/// when a request is issued, so a login or logout takes effect for the next
/// request without rebuilding the client.
#[derive(Debug, Clone, Default)]
pub struct AuthState {
    token: Arc<RwLock<Option<String>>>,
}

impl AuthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        let state = Self::new();
        state.set_token(token);
        state
    }

    /// Set the bearer token for authenticated requests.
    /// An empty token is treated as no token.
    pub fn set_token(&self, token: impl Into<String>) {
        let token = token.into();
        let mut guard = self.token.write().unwrap_or_else(PoisonError::into_inner);
        *guard = if token.is_empty() { None } else { Some(token) };
    }

    pub fn clear(&self) {
        let mut guard = self.token.write().unwrap_or_else(PoisonError::into_inner);
        *guard = None;
    }

    pub fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }
}
