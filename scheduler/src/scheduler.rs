use std::sync::Arc;

use async_trait::async_trait;
use comms::{
    ApiErr, ParameterServerApi, SchedulerApi,
    specs::{TrainRequest, TrainTask},
};
use log::{debug, info, warn};
use rand::Rng;
use tokio::sync::{mpsc, oneshot};

use crate::{
    config::SchedulerConfig,
    error::SchedulerErr,
    policy::{SchedulingPolicy, ThroughputPolicy},
    state::ClusterState,
};

type Reply<T> = oneshot::Sender<Result<T, SchedulerErr>>;

enum Command {
    Submit {
        request: TrainRequest,
        reply: Reply<String>,
    },
    Update {
        task: TrainTask,
        reply: Reply<()>,
    },
    Finish {
        job_id: String,
        reply: Reply<()>,
    },
    Jobs {
        reply: Reply<Vec<String>>,
    },
}

/// The cluster wide scheduler, a single task owning the `ClusterState`.
///
/// Every request goes through its `SchedulerHandle`, decisions are delivered
/// to the parameter server on their own task so a slow delivery never stalls the loop.
pub struct Scheduler {
    rx: mpsc::Receiver<Command>,
    state: ClusterState,
    policy: Box<dyn SchedulingPolicy>,
}

/// A cheap, cloneable entry point to a running `Scheduler`.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    tx: mpsc::Sender<Command>,
}

impl Scheduler {
    /// Creates a new `Scheduler` using the `ThroughputPolicy`.
    ///
    /// # Returns
    /// The scheduler, to be run with `Scheduler::run`, and its handle.
    pub fn new(config: &SchedulerConfig) -> (Self, SchedulerHandle) {
        let policy = ThroughputPolicy::new(config.policy.clone(), config.max_parallelism);
        Self::with_policy(config, policy)
    }

    /// Creates a new `Scheduler` deciding with the given policy.
    pub fn with_policy<P>(config: &SchedulerConfig, policy: P) -> (Self, SchedulerHandle)
    where
        P: SchedulingPolicy + 'static,
    {
        let (tx, rx) = mpsc::channel(config.queue.max(1));

        let scheduler = Self {
            rx,
            state: ClusterState::new(config.capacity),
            policy: Box::new(policy),
        };

        (scheduler, SchedulerHandle { tx })
    }

    /// Serves commands until every handle is dropped.
    ///
    /// # Arguments
    /// * `ps` - Where new jobs are started and decisions delivered.
    pub async fn run(mut self, ps: Arc<dyn ParameterServerApi>) {
        info!(capacity = self.state.capacity(); "scheduler running");

        while let Some(command) = self.rx.recv().await {
            match command {
                Command::Submit { request, reply } => {
                    let res = self.submit(request, ps.as_ref()).await;
                    let _ = reply.send(res);
                }
                Command::Update { task, reply } => {
                    self.update(task, &ps);
                    let _ = reply.send(Ok(()));
                }
                Command::Finish { job_id, reply } => {
                    self.finish(&job_id);
                    let _ = reply.send(Ok(()));
                }
                Command::Jobs { reply } => {
                    let _ = reply.send(Ok(self.state.job_ids()));
                }
            }
        }

        info!("scheduler stopped");
    }

    async fn submit(&mut self, request: TrainRequest, ps: &dyn ParameterServerApi) -> Result<String, SchedulerErr> {
        if request.epochs == 0 {
            return Err(SchedulerErr::Invalid("epochs must be positive".to_string()));
        }

        if request.batch_size == 0 {
            return Err(SchedulerErr::Invalid("batch_size must be positive".to_string()));
        }

        let parallelism = self.policy.initial(&request, &self.state);
        if parallelism == 0 {
            warn!(in_use = self.state.in_use(); "refused a job, the cluster is full");
            return Err(SchedulerErr::NoCapacity);
        }

        let job_id = self.mint_id();
        let task = TrainTask::new(request, job_id.clone(), parallelism);

        self.state.insert(&job_id, parallelism);

        if let Err(e) = ps.start_job(task).await {
            self.state.remove(&job_id);
            return Err(e.into());
        }

        info!(job_id = job_id.as_str(), parallelism = parallelism; "job submitted");
        Ok(job_id)
    }

    fn update(&mut self, task: TrainTask, ps: &Arc<dyn ParameterServerApi>) {
        let job_id = task.job_id().to_string();

        if !self.state.contains(&job_id) {
            debug!(job_id = job_id.as_str(); "first request of an unknown job");
            self.state.insert(&job_id, task.job.state.parallelism);
        }

        let response = self
            .policy
            .decide(&job_id, &task.job.state, &task.job.history, &self.state);
        self.state.record(&job_id, response.parallelism);

        info!(
            job_id = job_id.as_str(), from = task.job.state.parallelism, to = response.parallelism;
            "parallelism decided"
        );

        let ps = Arc::clone(ps);
        tokio::spawn(async move {
            if let Err(e) = ps.update(&job_id, response).await {
                warn!(job_id = job_id.as_str(); "dropped the schedule response: {e}");
            }
        });
    }

    fn finish(&mut self, job_id: &str) {
        if self.state.remove(job_id) {
            info!(job_id = job_id; "job released");
        } else {
            debug!(job_id = job_id; "finish of an unknown job");
        }
    }

    /// Mints a new job id, eight lowercase hex characters.
    fn mint_id(&self) -> String {
        let mut rng = rand::rng();

        loop {
            let id = format!("{:08x}", rng.random::<u32>());
            if !self.state.contains(&id) {
                return id;
            }
        }
    }
}

impl SchedulerHandle {
    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> Result<T, SchedulerErr> {
        let (reply, rx) = oneshot::channel();

        self.tx
            .send(command(reply))
            .await
            .map_err(|_| SchedulerErr::Closed)?;

        rx.await.map_err(|_| SchedulerErr::Closed)?
    }

    /// The ids of the jobs the scheduler currently tracks, sorted.
    pub async fn jobs(&self) -> Result<Vec<String>, SchedulerErr> {
        self.request(|reply| Command::Jobs { reply }).await
    }
}

#[async_trait]
impl SchedulerApi for SchedulerHandle {
    async fn submit(&self, request: TrainRequest) -> Result<String, ApiErr> {
        Ok(self.request(|reply| Command::Submit { request, reply }).await?)
    }

    async fn update_job(&self, task: &TrainTask) -> Result<(), ApiErr> {
        let task = task.clone();
        Ok(self.request(|reply| Command::Update { task, reply }).await?)
    }

    async fn finish_job(&self, job_id: &str) -> Result<(), ApiErr> {
        let job_id = job_id.to_string();
        Ok(self.request(|reply| Command::Finish { job_id, reply }).await?)
    }
}
