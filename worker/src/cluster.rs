use async_trait::async_trait;

use crate::{error::Result, spec::PodTemplate};

/// The lifecycle phase of a pod as reported by the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl PodPhase {
    /// A pod in a terminal phase will never become ready.
    pub fn is_terminal(self) -> bool {
        matches!(self, PodPhase::Succeeded | PodPhase::Failed)
    }
}

/// A reference to a created pod, never the cluster's own object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodRef {
    pub name: String,
    pub addr: Option<String>,
}

/// The container orchestrator hosting the workers.
#[async_trait]
pub trait Cluster: Send + Sync {
    /// Creates a pod from a template.
    async fn create_pod(&self, template: &PodTemplate) -> Result<PodRef>;

    /// Queries the current phase of a pod.
    async fn pod_phase(&self, name: &str) -> Result<PodPhase>;

    /// Deletes a pod, failing with `LifecycleErr::NotFound` if it doesn't exist.
    async fn delete_pod(&self, name: &str) -> Result<()>;

    /// Lists the names of the pods whose labels match every pair in `selector`.
    async fn list_pods(&self, selector: &[(&str, &str)]) -> Result<Vec<String>>;
}
