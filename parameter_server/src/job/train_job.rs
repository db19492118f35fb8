use std::{sync::Arc, time::Duration};

use comms::{
    SchedulerApi,
    specs::{
        FunctionArgs, History, JobStatus, MetricUpdate, ScheduleResponse, TrainTask,
        ValidationReport,
    },
};
use futures::future::join_all;
use log::{debug, error, info, warn};
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use worker::{Function, Readiness, WorkerHandle, WorkerLifecycleManager};

use super::{HistoryStore, JobErr, JobPhase, Rendezvous};
use crate::{
    config::ParameterServerConfig,
    model::{LrScheduler, Model},
    storage::ParameterStore,
};

/// Everything a coordinator shares with the rest of the parameter server.
pub struct JobContext {
    pub store: Arc<dyn ParameterStore>,
    pub lifecycle: WorkerLifecycleManager,
    pub function: Arc<dyn Function>,
    pub scheduler: Arc<dyn SchedulerApi>,
    pub rendezvous: Arc<Rendezvous>,
    pub histories: Arc<dyn HistoryStore>,
    pub config: ParameterServerConfig,
}

/// The outcome of a single try of an epoch.
enum Attempt {
    /// Every gradient was aggregated, holds the mean train loss.
    Done(f64),
    /// This many workers failed, the epoch is retried with fewer workers.
    Failed(usize),
    /// Some worker didn't make it in time, the epoch is retried as is.
    TimedOut,
}

/// The coordinator of a single training job.
///
/// Drives the job through `JobPhase`s one epoch at a time: workers are spawned,
/// their gradients aggregated into the model, the model validated and the
/// scheduler asked for the parallelism of the next epochs.
pub struct TrainJob {
    ctx: Arc<JobContext>,
    task: TrainTask,
    phase: JobPhase,
    last_validation: Option<ValidationReport>,
    cancel: CancellationToken,
}

impl TrainJob {
    /// Creates a new `TrainJob`, its rendezvous slot must already be registered.
    ///
    /// # Arguments
    /// * `ctx` - The shared parameter server context.
    /// * `task` - The task of the job, holding its initial parallelism.
    /// * `cancel` - Stops the job at its next await point.
    pub fn new(ctx: Arc<JobContext>, task: TrainTask, cancel: CancellationToken) -> Self {
        Self {
            ctx,
            task,
            phase: JobPhase::Created,
            last_validation: None,
            cancel,
        }
    }

    pub fn job_id(&self) -> &str {
        self.task.job_id()
    }

    pub fn phase(&self) -> JobPhase {
        self.phase
    }

    /// Runs the job until it reaches a terminal state and tears it down.
    ///
    /// # Returns
    /// The persisted history of the job.
    pub async fn serve(mut self) -> History {
        let cancel = self.cancel.clone();

        let result = tokio::select! {
            res = self.train() => res,
            _ = cancel.cancelled() => Err(JobErr::Cancelled),
        };

        self.finish(result).await
    }

    async fn train(&mut self) -> Result<(), JobErr> {
        self.transition(JobPhase::Building);
        let model = self.build().await?;
        let epochs = self.task.parameters.epochs;

        for epoch in 0..epochs {
            self.transition(JobPhase::Epoch(epoch));

            let started = Instant::now();
            let train_loss = self.run_epoch(&model, epoch).await?;
            let duration = started.elapsed();
            self.task.job.state.elapsed_time += duration.as_secs_f64();

            let validation = if self.should_validate(epoch) {
                self.transition(JobPhase::Validating);
                Some(self.validate(&model, epoch).await?)
            } else {
                None
            };

            self.record(train_loss, duration, validation);

            if validation.is_some_and(|v| self.goal_reached(v)) {
                info!(job_id = self.job_id(), epoch = epoch; "goal accuracy reached");
                return Ok(());
            }

            if self.should_schedule(epoch) {
                self.transition(JobPhase::Scheduling);
                self.request_parallelism().await;
            }
        }

        Ok(())
    }

    /// Initializes the model through the function and loads it from the store.
    async fn build(&self) -> Result<Model, JobErr> {
        let args = self.args(0, 0, self.task.job.state.parallelism, self.task.parameters.learning_rate);
        let report = self.ctx.function.init(&args).await?;

        let model = Model::build(
            self.ctx.store.as_ref(),
            self.job_id(),
            report.layers.as_slice(),
            self.task.parameters.learning_rate,
            LrScheduler::new(self.ctx.config.lr_decay),
        )?;

        Ok(model)
    }

    /// Runs an epoch, retrying it when workers fail or time out.
    ///
    /// # Returns
    /// The mean train loss of the epoch's workers.
    async fn run_epoch(&mut self, model: &Model, epoch: usize) -> Result<f64, JobErr> {
        let max_retries = self.ctx.config.max_epoch_retries;
        let mut parallelism = self.task.job.state.parallelism;

        for attempt in 0..=max_retries {
            if attempt > 0 {
                info!(job_id = self.job_id(), epoch = epoch, attempt = attempt; "retrying epoch with {parallelism} worker(s)");
            }

            match self.try_epoch(model, epoch, parallelism).await? {
                Attempt::Done(loss) => {
                    self.task.job.state.parallelism = parallelism;
                    return Ok(loss);
                }
                Attempt::Failed(failed) => {
                    parallelism = parallelism.saturating_sub(failed);
                    warn!(job_id = self.job_id(), epoch = epoch; "{failed} worker(s) failed");

                    if parallelism == 0 {
                        return Err(JobErr::NoWorkers { epoch });
                    }
                }
                Attempt::TimedOut => {
                    warn!(job_id = self.job_id(), epoch = epoch; "epoch timed out");
                }
            }
        }

        Err(JobErr::RetriesExhausted {
            epoch,
            tries: max_retries + 1,
        })
    }

    async fn try_epoch(&self, model: &Model, epoch: usize, parallelism: usize) -> Result<Attempt, JobErr> {
        let worker_ids: Vec<_> = (0..parallelism).collect();
        let config = &self.ctx.config;
        let lifecycle = &self.ctx.lifecycle;
        let job_id = self.job_id();

        let created = join_all(
            worker_ids
                .iter()
                .map(|&id| lifecycle.create_worker(job_id, id, &config.worker)),
        )
        .await;

        let mut handles = Vec::with_capacity(parallelism);
        let mut failed = 0;

        for res in created {
            match res {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    warn!(job_id = job_id, epoch = epoch; "could not create worker: {e}");
                    failed += 1;
                }
            }
        }

        let readiness = join_all(
            handles
                .iter()
                .map(|h| lifecycle.await_ready(h, config.lifecycle.ready_timeout)),
        )
        .await;

        let timed_out = readiness.iter().filter(|r| **r == Readiness::TimedOut).count();
        failed += readiness.iter().filter(|r| matches!(r, Readiness::Failed(_))).count();

        if failed > 0 || timed_out > 0 {
            self.teardown(model, &handles, &worker_ids).await;
            return Ok(match failed {
                0 => Attempt::TimedOut,
                n => Attempt::Failed(n),
            });
        }

        let lr = model.lr();
        let trained = join_all(handles.iter().map(|h| {
            let args = self.args(h.worker_id, epoch, parallelism, lr);
            async move { self.ctx.function.train(&args).await }
        }));

        let Ok(reports) = time::timeout(config.epoch_timeout, trained).await else {
            self.teardown(model, &handles, &worker_ids).await;
            return Ok(Attempt::TimedOut);
        };

        let mut losses = Vec::with_capacity(parallelism);
        for (handle, report) in handles.iter().zip(reports) {
            match report {
                Ok(report) => losses.push(report.loss),
                Err(e) => warn!(job_id = job_id, worker_id = handle.worker_id; "{e}"),
            }
        }

        if losses.len() < parallelism {
            self.teardown(model, &handles, &worker_ids).await;
            return Ok(Attempt::Failed(parallelism - losses.len()));
        }

        if !self.await_gradients(model, &worker_ids).await {
            self.teardown(model, &handles, &worker_ids).await;
            return Ok(Attempt::TimedOut);
        }

        self.destroy_workers(&handles).await;

        let store = self.ctx.store.as_ref();
        let result = model.update(store, &worker_ids).and_then(|_| model.save(store));
        model.clear_gradients(store, &worker_ids);
        result?;

        debug!(job_id = job_id, epoch = epoch; "aggregated {parallelism} gradient(s)");
        Ok(Attempt::Done(losses.iter().sum::<f64>() / losses.len() as f64))
    }

    /// Polls the store until every worker wrote its gradients.
    ///
    /// # Returns
    /// Whether they were all written before the timeout.
    async fn await_gradients(&self, model: &Model, worker_ids: &[usize]) -> bool {
        let store = self.ctx.store.as_ref();

        let poll = async {
            loop {
                let pending = model.pending_gradients(store, worker_ids);
                if pending.is_empty() {
                    return;
                }

                debug!(job_id = self.job_id(); "waiting for the gradients of {pending:?}");
                time::sleep(self.ctx.config.gradient_poll).await;
            }
        };

        time::timeout(self.ctx.config.gradient_timeout, poll).await.is_ok()
    }

    /// Destroys the workers of a failed attempt and discards its gradients.
    async fn teardown(&self, model: &Model, handles: &[WorkerHandle], worker_ids: &[usize]) {
        self.destroy_workers(handles).await;
        model.clear_gradients(self.ctx.store.as_ref(), worker_ids);
    }

    async fn destroy_workers(&self, handles: &[WorkerHandle]) {
        let destroyed = join_all(handles.iter().map(|h| self.ctx.lifecycle.destroy_worker(h))).await;

        for (handle, res) in handles.iter().zip(destroyed) {
            if let Err(e) = res {
                warn!(pod = handle.pod.as_str(); "could not destroy worker: {e}");
            }
        }
    }

    async fn validate(&self, model: &Model, epoch: usize) -> Result<ValidationReport, JobErr> {
        let args = self.args(0, epoch, self.task.job.state.parallelism, model.lr());
        let report = self.ctx.function.validate(&args).await?;
        let lr = model.update_lr();

        info!(job_id = self.job_id(), epoch = epoch, accuracy = report.accuracy, lr = lr; "validated");
        Ok(report)
    }

    /// Appends the epoch's metrics to the history, reusing the last validation
    /// when the epoch didn't validate.
    fn record(&mut self, train_loss: f64, duration: Duration, validation: Option<ValidationReport>) {
        if validation.is_some() {
            self.last_validation = validation;
        }

        let (validation_loss, accuracy) = self
            .last_validation
            .map_or((0., 0.), |v| (v.loss, v.accuracy));

        self.task.job.history.push(MetricUpdate {
            validation_loss,
            accuracy,
            train_loss,
            parallelism: self.task.job.state.parallelism as f64,
            epoch_duration: duration.as_secs_f64(),
        });
    }

    /// Asks the scheduler for a new parallelism, keeping the current one when
    /// it can't be reached.
    async fn request_parallelism(&mut self) {
        let config = &self.ctx.config;
        let mut backoff = config.schedule_backoff;
        let tries = config.schedule_tries.max(1);

        for attempt in 1..=tries {
            match self.try_schedule().await {
                Ok(ScheduleResponse { parallelism: 0 }) => {
                    warn!(job_id = self.job_id(); "ignoring a parallelism of 0");
                    return;
                }
                Ok(ScheduleResponse { parallelism }) => {
                    info!(job_id = self.job_id(), parallelism = parallelism; "new parallelism");
                    self.task.job.state.parallelism = parallelism;
                    return;
                }
                Err(e) => {
                    warn!(job_id = self.job_id(), attempt = attempt; "schedule request failed: {e}")
                }
            }

            if attempt < tries {
                time::sleep(backoff).await;
                backoff *= config.backoff_factor;
            }
        }

        warn!(
            job_id = self.job_id(), parallelism = self.task.job.state.parallelism;
            "scheduler unreachable, keeping the last parallelism"
        );
    }

    async fn try_schedule(&self) -> Result<ScheduleResponse, JobErr> {
        let rendezvous = &self.ctx.rendezvous;
        let rx = rendezvous.arm(self.job_id())?;

        if let Err(e) = self.ctx.scheduler.update_job(&self.task).await {
            rendezvous.disarm(self.job_id());
            return Err(e.into());
        }

        match time::timeout(self.ctx.config.schedule_timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) | Err(_) => {
                rendezvous.disarm(self.job_id());
                Err(JobErr::ScheduleTimeout)
            }
        }
    }

    /// Tears the job down once it reached a terminal state.
    async fn finish(mut self, result: Result<(), JobErr>) -> History {
        let (status, error) = match result {
            Ok(()) => {
                self.transition(JobPhase::Finished);
                (JobStatus::Finished, None)
            }
            Err(e) => {
                self.transition(JobPhase::Failed);
                error!(job_id = self.job_id(); "job failed: {e}");
                (JobStatus::Failed, Some(e.to_string()))
            }
        };

        let ctx = &self.ctx;
        let job_id = self.task.job_id();

        if let Err(e) = ctx.lifecycle.destroy_job(job_id).await {
            warn!(job_id = job_id; "could not reclaim the job's workers: {e}");
        }

        if let Err(e) = ctx.scheduler.finish_job(job_id).await {
            warn!(job_id = job_id; "could not notify the scheduler: {e}");
        }

        ctx.rendezvous.release(job_id);

        let history = History {
            id: job_id.to_string(),
            task: self.task.parameters.clone(),
            data: self.task.job.history.clone(),
            status,
            error,
        };

        ctx.histories.save(history.clone());
        history
    }

    fn should_validate(&self, epoch: usize) -> bool {
        match self.task.parameters.options.validate_every {
            0 => epoch + 1 == self.task.parameters.epochs,
            every => (epoch + 1) % every == 0,
        }
    }

    fn should_schedule(&self, epoch: usize) -> bool {
        let options = &self.task.parameters.options;

        !options.static_parallelism
            && (epoch + 1) % options.sync_period() == 0
            && epoch + 1 < self.task.parameters.epochs
    }

    fn goal_reached(&self, validation: ValidationReport) -> bool {
        let goal = self.task.parameters.options.goal_accuracy;
        goal > 0. && validation.accuracy >= goal
    }

    fn args(&self, worker_id: usize, epoch: usize, n_workers: usize, lr: f32) -> FunctionArgs {
        let params = &self.task.parameters;

        FunctionArgs {
            job_id: self.job_id().to_string(),
            worker_id,
            n_workers,
            epoch,
            batch_size: params.batch_size,
            lr,
            k: params.options.k,
            dataset: params.dataset.clone(),
            function_name: params.function_name.clone(),
        }
    }

    fn transition(&mut self, phase: JobPhase) {
        debug!(job_id = self.job_id(); "{} -> {}", self.phase, phase);
        self.phase = phase;
    }
}
