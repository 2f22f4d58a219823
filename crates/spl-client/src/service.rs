//! The `SplunkService` seam

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Entity, Namespace, Result};

/// Parameters of a one-shot search job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Full SPL, including the leading `search` command when needed
    pub query: String,
    pub earliest: String,
    pub latest: String,
}

/// Handle of a dispatched search job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchJob {
    pub sid: String,
}

/// Progress snapshot of a search job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub done_progress: f64,
    pub scan_count: u64,
    pub event_count: u64,
    pub result_count: u64,
    pub is_done: bool,
}

/// Operations the rest of the workspace needs from a Splunk instance.
///
/// `endpoint` is a path relative to `/servicesNS/{owner}/{app}/`, for example
/// `authentication/users` or `configs/conf-props`.
#[async_trait]
pub trait SplunkService: Send + Sync {
    /// `scheme://host:port` of the instance.
    fn authority(&self) -> String;

    /// User the connection is authenticated as, if known.
    fn username(&self) -> Option<String>;

    /// Currently active namespace.
    fn namespace(&self) -> Namespace;

    /// Replace the active namespace.
    fn set_namespace(&self, namespace: Namespace);

    /// All entities of an endpoint.
    async fn list(&self, endpoint: &str) -> Result<Vec<Entity>>;

    /// A single entity by name.
    async fn get(&self, endpoint: &str, name: &str) -> Result<Entity>;

    /// Create an entity.
    async fn create(&self, endpoint: &str, name: &str, args: &Map<String, Value>) -> Result<()>;

    /// Update properties of an existing entity.
    async fn update(&self, endpoint: &str, name: &str, args: &Map<String, Value>) -> Result<()>;

    /// Delete an entity.
    async fn delete(&self, endpoint: &str, name: &str) -> Result<()>;

    /// All capabilities known to the instance.
    async fn capabilities(&self) -> Result<Vec<String>>;

    /// Dispatch a search job.
    async fn create_search(&self, request: &SearchRequest) -> Result<SearchJob>;

    /// Current status of a search job.
    async fn job_status(&self, job: &SearchJob) -> Result<JobStatus>;

    /// All results of a finished search job.
    async fn job_results(&self, job: &SearchJob) -> Result<Vec<Map<String, Value>>>;

    /// Restart splunkd.
    async fn restart(&self) -> Result<()>;
}
