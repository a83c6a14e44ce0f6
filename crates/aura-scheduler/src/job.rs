use async_trait::async_trait;
use serde_json::Value;

/// What a job run produces: a JSON summary on success, any error otherwise.
pub type JobResult = std::result::Result<Value, Box<dyn std::error::Error + Send + Sync>>;

/// A unit of work the engine can run on a schedule or on demand.
#[async_trait]
pub trait ScheduledJob: Send + Sync {
    async fn run(&self) -> JobResult;
}
