use async_trait::async_trait;
use serde_json::Value;

use super::{ApiError, RequestSpec};

/// Executes one backend call per invocation.
///
/// Implementations never panic on backend failures: every outcome, including
/// transport errors and non-2xx statuses, comes back as a `Result`.
#[async_trait]
pub trait FetchExecutor: Send + Sync {
    /// A name for tracing, e.g. "http".
    fn name(&self) -> &'static str;

    async fn execute(&self, request: RequestSpec) -> Result<Value, ApiError>;
}
