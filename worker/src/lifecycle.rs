use std::{sync::Arc, time::Duration};

use log::{debug, info, warn};
use tokio::time;

use crate::{
    cluster::{Cluster, PodPhase},
    error::{LifecycleErr, Result},
    spec::{JOB_LABEL, WorkerSpec},
};

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Identifies a created worker, the pod itself stays owned by the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerHandle {
    pub job_id: String,
    pub worker_id: usize,
    pub pod: String,
    pub addr: Option<String>,
}

/// The outcome of waiting for a worker to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    /// The pod reached a terminal phase, or couldn't be queried, before running.
    Failed(String),
    /// The pod never reached the running phase within the timeout.
    TimedOut,
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, Readiness::Ready)
    }
}

/// Creates, watches and destroys the ephemeral compute units of the jobs.
///
/// It never retries on its own, the retry policy belongs to the caller.
#[derive(Clone)]
pub struct WorkerLifecycleManager {
    cluster: Arc<dyn Cluster>,
    poll_interval: Duration,
}

impl WorkerLifecycleManager {
    /// Creates a new `WorkerLifecycleManager`.
    ///
    /// # Arguments
    /// * `cluster` - The cluster hosting the workers.
    /// * `poll_interval` - How often the phase of a starting pod is queried.
    pub fn new(cluster: Arc<dyn Cluster>, poll_interval: Duration) -> Self {
        Self {
            cluster,
            poll_interval,
        }
    }

    /// Provisions the compute unit of a worker.
    ///
    /// # Arguments
    /// * `job_id` - The job the worker belongs to.
    /// * `worker_id` - The index of the worker within the epoch.
    /// * `spec` - The image and port of the worker.
    ///
    /// # Returns
    /// The handle of the new worker or the cluster's error.
    pub async fn create_worker(
        &self,
        job_id: &str,
        worker_id: usize,
        spec: &WorkerSpec,
    ) -> Result<WorkerHandle> {
        let template = spec.template(job_id, worker_id);
        let pod = self.cluster.create_pod(&template).await?;

        debug!(job_id = job_id, worker_id = worker_id; "created pod {}", pod.name);

        Ok(WorkerHandle {
            job_id: job_id.to_string(),
            worker_id,
            pod: pod.name,
            addr: pod.addr,
        })
    }

    /// Polls the phase of the worker's pod until it runs, fails or the timeout expires.
    ///
    /// The first poll happens immediately.
    ///
    /// # Arguments
    /// * `handle` - The worker to wait for.
    /// * `timeout` - The maximum time to wait.
    pub async fn await_ready(&self, handle: &WorkerHandle, timeout: Duration) -> Readiness {
        let poll = async {
            let mut ticker = time::interval(self.poll_interval.max(MIN_POLL_INTERVAL));

            loop {
                ticker.tick().await;

                match self.cluster.pod_phase(&handle.pod).await {
                    Ok(PodPhase::Running) => return Readiness::Ready,
                    Ok(phase) if phase.is_terminal() => {
                        return Readiness::Failed(format!("pod ended as {phase:?} before running"));
                    }
                    Ok(_) => {}
                    Err(e) => return Readiness::Failed(e.to_string()),
                }
            }
        };

        let readiness = time::timeout(timeout, poll)
            .await
            .unwrap_or(Readiness::TimedOut);

        match &readiness {
            Readiness::Ready => debug!(pod = handle.pod.as_str(); "worker ready"),
            Readiness::Failed(reason) => warn!(pod = handle.pod.as_str(); "worker failed: {reason}"),
            Readiness::TimedOut => warn!(pod = handle.pod.as_str(); "worker not ready after {timeout:?}"),
        }

        readiness
    }

    /// Deletes the worker's pod, a pod that's already gone isn't an error.
    pub async fn destroy_worker(&self, handle: &WorkerHandle) -> Result<()> {
        match self.cluster.delete_pod(&handle.pod).await {
            Ok(()) | Err(LifecycleErr::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Deletes every pod labelled with the job, including leaked ones.
    ///
    /// # Returns
    /// The amount of deleted pods.
    pub async fn destroy_job(&self, job_id: &str) -> Result<usize> {
        let pods = self.cluster.list_pods(&[(JOB_LABEL, job_id)]).await?;
        let mut deleted = 0;

        for pod in pods {
            match self.cluster.delete_pod(&pod).await {
                Ok(()) => deleted += 1,
                Err(LifecycleErr::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        if deleted > 0 {
            info!(job_id = job_id; "reclaimed {deleted} worker(s)");
        }

        Ok(deleted)
    }
}
