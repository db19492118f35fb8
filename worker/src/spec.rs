use std::{collections::BTreeMap, time::Duration};

pub const JOB_LABEL: &str = "job";
pub const SVC_LABEL: &str = "svc";
const SVC_WORKER: &str = "worker";

/// Readiness probe hitting an http path of the pod.
#[derive(Debug, Clone, PartialEq)]
pub struct Probe {
    pub path: String,
    pub port: u16,
    pub initial_delay: Duration,
    pub period: Duration,
    pub timeout: Duration,
    pub failure_threshold: u32,
}

impl Probe {
    /// A probe on `/health` checked every second.
    pub fn health(port: u16) -> Self {
        Self {
            path: "/health".to_string(),
            port,
            initial_delay: Duration::from_secs(1),
            period: Duration::from_secs(1),
            timeout: Duration::from_secs(1),
            failure_threshold: 30,
        }
    }
}

/// Everything the cluster needs to run one compute unit.
#[derive(Debug, Clone, PartialEq)]
pub struct PodTemplate {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub image: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub port: u16,
    pub readiness: Probe,
    /// Workers are ephemeral, the cluster must never restart them.
    pub restart: bool,
}

impl PodTemplate {
    /// Whether every `(key, value)` pair in `selector` is present in the labels.
    pub fn matches(&self, selector: &[(&str, &str)]) -> bool {
        selector
            .iter()
            .all(|(k, v)| self.labels.get(*k).is_some_and(|l| l == v))
    }
}

/// The job independent description of a worker.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerSpec {
    pub image: String,
    pub port: u16,
    pub env: Vec<(String, String)>,
}

impl Default for WorkerSpec {
    fn default() -> Self {
        Self {
            image: "elastic-orchestra/worker:latest".to_string(),
            port: 9090,
            env: Vec::new(),
        }
    }
}

impl WorkerSpec {
    /// Renders the pod template of the `worker_id`th worker of a job.
    ///
    /// # Arguments
    /// * `job_id` - The job the worker belongs to, used as a label.
    /// * `worker_id` - The index of the worker within the epoch.
    ///
    /// # Returns
    /// A `PodTemplate` named `worker-{job_id}-{worker_id}`.
    pub fn template(&self, job_id: &str, worker_id: usize) -> PodTemplate {
        let labels = BTreeMap::from([
            (JOB_LABEL.to_string(), job_id.to_string()),
            (SVC_LABEL.to_string(), SVC_WORKER.to_string()),
        ]);

        PodTemplate {
            name: format!("worker-{job_id}-{worker_id}"),
            labels,
            image: self.image.clone(),
            args: vec![
                "--jobId".to_string(),
                job_id.to_string(),
                "--workerId".to_string(),
                worker_id.to_string(),
                "--port".to_string(),
                self.port.to_string(),
            ],
            env: self.env.clone(),
            port: self.port,
            readiness: Probe::health(self.port),
            restart: false,
        }
    }
}
