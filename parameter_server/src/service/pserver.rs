use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use comms::{
    ApiErr, ParameterServerApi,
    proto::Status,
    specs::{History, JobStatus, ScheduleResponse, TrainTask},
};
use log::{info, warn};
use parking_lot::RwLock;
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::{
    job::{Delivery, JobContext, JobErr, RendezvousErr, TrainJob},
    storage::ParameterStore,
};

struct Inner {
    ctx: Arc<JobContext>,
    statuses: RwLock<HashMap<String, JobStatus>>,
    tracker: TaskTracker,
    cancel: CancellationToken,
}

/// Hosts the coordinators of every job, one task per job.
#[derive(Clone)]
pub struct ParameterServer {
    inner: Arc<Inner>,
}

impl ParameterServer {
    /// Creates a new `ParameterServer`.
    ///
    /// # Arguments
    /// * `ctx` - The store, lifecycle manager, function and scheduler shared by the jobs.
    pub fn new(ctx: JobContext) -> Self {
        let inner = Inner {
            ctx: Arc::new(ctx),
            statuses: RwLock::new(HashMap::new()),
            tracker: TaskTracker::new(),
            cancel: CancellationToken::new(),
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    /// Spawns the coordinator of a new job.
    ///
    /// # Returns
    /// An error if the task is invalid or its job is already running.
    pub fn start_job(&self, task: TrainTask) -> Result<(), JobErr> {
        let job_id = task.job_id().to_string();

        if job_id.is_empty() {
            return Err(JobErr::InvalidTask("the job has no id".to_string()));
        }

        if task.job.state.parallelism == 0 {
            return Err(JobErr::InvalidTask("the parallelism must be positive".to_string()));
        }

        {
            let mut statuses = self.inner.statuses.write();
            if statuses.get(&job_id) == Some(&JobStatus::Running) {
                return Err(JobErr::AlreadyRunning(job_id));
            }

            statuses.insert(job_id.clone(), JobStatus::Running);
        }

        self.inner.ctx.rendezvous.register(&job_id);

        info!(
            job_id = job_id.as_str(), parallelism = task.job.state.parallelism, epochs = task.parameters.epochs;
            "starting job"
        );

        let job = TrainJob::new(
            Arc::clone(&self.inner.ctx),
            task,
            self.inner.cancel.child_token(),
        );
        let inner = Arc::clone(&self.inner);

        self.inner.tracker.spawn(async move {
            let history = job.serve().await;
            info!(job_id = history.id.as_str(); "job ended as {:?}", history.status);
            inner.statuses.write().insert(history.id, history.status);
        });

        Ok(())
    }

    /// Hands a scheduling decision to the job waiting for it.
    pub fn deliver(&self, job_id: &str, response: ScheduleResponse) -> Result<Delivery, RendezvousErr> {
        let delivery = self.inner.ctx.rendezvous.deliver(job_id, response)?;

        if delivery == Delivery::Dropped {
            warn!(job_id = job_id; "nobody waits for a schedule response, dropped it");
        }

        Ok(delivery)
    }

    /// The store shared by the jobs and their functions.
    pub fn store(&self) -> &dyn ParameterStore {
        self.inner.ctx.store.as_ref()
    }

    pub fn status(&self, job_id: &str) -> Option<JobStatus> {
        self.inner.statuses.read().get(job_id).copied()
    }

    /// The persisted history of a terminated job.
    pub fn history(&self, job_id: &str) -> Option<History> {
        self.inner.ctx.histories.get(job_id)
    }

    /// The amount of jobs still running.
    pub fn running(&self) -> usize {
        self.inner.tracker.len()
    }

    /// Waits for every running job to terminate, no job may be started afterwards.
    pub async fn drain(&self) {
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
    }

    /// Cancels every running job and waits for their teardown.
    pub async fn shutdown(&self) {
        info!("shutting down {} job(s)", self.running());
        self.inner.cancel.cancel();
        self.drain().await;
    }
}

#[async_trait]
impl ParameterServerApi for ParameterServer {
    async fn start_job(&self, task: TrainTask) -> Result<(), ApiErr> {
        ParameterServer::start_job(self, task).map_err(|e| ApiErr::Status {
            status: Status::BadRequest,
            body: e.to_string(),
        })
    }

    async fn update(&self, job_id: &str, response: ScheduleResponse) -> Result<(), ApiErr> {
        self.deliver(job_id, response).map(drop).map_err(|e| {
            warn!(job_id = job_id; "{e}");
            ApiErr::Status {
                status: Status::BadRequest,
                body: e.to_string(),
            }
        })
    }
}
