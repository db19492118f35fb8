use std::{
    sync::{
        Arc, OnceLock,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use comms::{
    ApiErr, SchedulerApi,
    proto::{Request, Route, Status},
    server::Handler,
    specs::{
        FunctionArgs, History, InitReport, JobStatus, ScheduleResponse, TrainOptions,
        TrainReport, TrainRequest, TrainTask, ValidationReport,
    },
};
use parameter_server::{
    JobContext, MemoryHistoryStore, MemoryStore, ParameterServer, ParameterServerConfig,
    ParameterStore, Rendezvous,
    storage::TensorKey,
};
use parking_lot::Mutex;
use worker::{
    Cluster, Function, FunctionErr, LocalCluster, PodBehavior, WorkerLifecycleManager,
};

const LAYER: &str = "fc";

/// How a faulty worker misbehaves on its train invocation.
#[derive(Debug, Clone, Copy)]
enum Fault {
    /// Answers but never writes its gradients.
    Silent,
    /// Doesn't answer for the given time.
    Stall(Duration),
    /// Answers with an error.
    Error,
}

/// Writes a two weights, one bias layer and the same gradient for every worker.
struct MockFunction {
    store: Arc<MemoryStore>,
    bad_worker: Option<usize>,
    accuracy: f64,
    /// Worker 1 misbehaves on its first `faults` train invocations.
    fault: Option<Fault>,
    faults: AtomicUsize,
}

impl MockFunction {
    /// Takes one of the remaining faults if `worker_id` is the faulty worker.
    fn fault(&self, worker_id: usize) -> Option<Fault> {
        if worker_id != 1 {
            return None;
        }

        let left = self.faults.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        left.ok().and(self.fault)
    }
}

#[async_trait]
impl Function for MockFunction {
    async fn init(&self, args: &FunctionArgs) -> Result<InitReport, FunctionErr> {
        let job = args.job_id.as_str();
        self.store
            .write_tensor(&TensorKey::weights(LAYER, job), &[2], &[5., 5.])
            .unwrap();
        self.store
            .write_tensor(&TensorKey::bias(LAYER, job), &[1], &[0.])
            .unwrap();

        Ok(InitReport {
            layers: vec![LAYER.to_string()],
        })
    }

    async fn train(&self, args: &FunctionArgs) -> Result<TrainReport, FunctionErr> {
        let job = args.job_id.as_str();
        let weights = TensorKey::weights_grad(LAYER, job, args.worker_id);
        let bias = TensorKey::bias_grad(LAYER, job, args.worker_id);
        let loss = 1. / (args.epoch + 1) as f64;

        match self.fault(args.worker_id) {
            Some(Fault::Silent) => return Ok(TrainReport { loss }),
            Some(Fault::Stall(time)) => tokio::time::sleep(time).await,
            Some(Fault::Error) => {
                return Err(FunctionErr::Failed {
                    task: "train",
                    reason: "out of memory".to_string(),
                });
            }
            None => {}
        }

        if self.bad_worker == Some(args.worker_id) {
            self.store.write_tensor(&weights, &[3], &[1., 1., 1.]).unwrap();
        } else {
            self.store.write_tensor(&weights, &[2], &[1., 2.]).unwrap();
        }
        self.store.write_tensor(&bias, &[1], &[1.]).unwrap();

        Ok(TrainReport { loss })
    }

    async fn validate(&self, _: &FunctionArgs) -> Result<ValidationReport, FunctionErr> {
        Ok(ValidationReport {
            loss: 0.5,
            accuracy: self.accuracy,
        })
    }
}

/// Answers every schedule request with a fixed parallelism, or refuses them when `None`.
struct MockScheduler {
    ps: OnceLock<ParameterServer>,
    answer: Option<usize>,
    /// Accepts the requests but never delivers an answer.
    silent: bool,
    updates: AtomicUsize,
    finished: Mutex<Vec<String>>,
}

impl MockScheduler {
    fn new(answer: Option<usize>) -> Arc<Self> {
        Arc::new(Self {
            ps: OnceLock::new(),
            answer,
            silent: false,
            updates: AtomicUsize::new(0),
            finished: Mutex::new(Vec::new()),
        })
    }

    fn silent() -> Arc<Self> {
        Arc::new(Self {
            ps: OnceLock::new(),
            answer: None,
            silent: true,
            updates: AtomicUsize::new(0),
            finished: Mutex::new(Vec::new()),
        })
    }

    fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SchedulerApi for MockScheduler {
    async fn submit(&self, _: TrainRequest) -> Result<String, ApiErr> {
        Err(ApiErr::Unavailable("submit".to_string()))
    }

    async fn update_job(&self, task: &TrainTask) -> Result<(), ApiErr> {
        self.updates.fetch_add(1, Ordering::SeqCst);

        if self.silent {
            return Ok(());
        }

        let (Some(parallelism), Some(ps)) = (self.answer, self.ps.get().cloned()) else {
            return Err(ApiErr::Unavailable("scheduler".to_string()));
        };

        let job_id = task.job_id().to_string();
        tokio::spawn(async move { ps.deliver(&job_id, ScheduleResponse { parallelism }) });
        Ok(())
    }

    async fn finish_job(&self, job_id: &str) -> Result<(), ApiErr> {
        self.finished.lock().push(job_id.to_string());
        Ok(())
    }
}

struct Setup {
    ps: ParameterServer,
    store: Arc<MemoryStore>,
    cluster: Arc<LocalCluster>,
    scheduler: Arc<MockScheduler>,
}

fn setup(
    cluster: LocalCluster,
    scheduler: Arc<MockScheduler>,
    make_function: impl FnOnce(Arc<MemoryStore>) -> MockFunction,
) -> Setup {
    let store = Arc::new(MemoryStore::new());
    let cluster = Arc::new(cluster);
    let config = ParameterServerConfig {
        max_epoch_retries: 2,
        ..Default::default()
    };

    let ctx = JobContext {
        store: Arc::clone(&store) as Arc<dyn ParameterStore>,
        lifecycle: WorkerLifecycleManager::new(
            Arc::clone(&cluster) as Arc<dyn Cluster>,
            config.lifecycle.poll_interval,
        ),
        function: Arc::new(make_function(Arc::clone(&store))),
        scheduler: Arc::clone(&scheduler) as Arc<dyn SchedulerApi>,
        rendezvous: Arc::new(Rendezvous::new()),
        histories: Arc::new(MemoryHistoryStore::new()),
        config,
    };

    let ps = ParameterServer::new(ctx);
    let _ = scheduler.ps.set(ps.clone());

    Setup {
        ps,
        store,
        cluster,
        scheduler,
    }
}

fn function(store: Arc<MemoryStore>) -> MockFunction {
    MockFunction {
        store,
        bad_worker: None,
        accuracy: 0.5,
        fault: None,
        faults: AtomicUsize::new(0),
    }
}

fn task(id: &str, epochs: usize, parallelism: usize, options: TrainOptions) -> TrainTask {
    let request = TrainRequest {
        model_type: "mlp".to_string(),
        batch_size: 32,
        epochs,
        dataset: "mnist".to_string(),
        learning_rate: 0.1,
        function_name: "network".to_string(),
        options,
    };

    TrainTask::new(request, id, parallelism)
}

fn static_options() -> TrainOptions {
    TrainOptions {
        static_parallelism: true,
        ..Default::default()
    }
}

async fn run(setup: &Setup, task: TrainTask) -> History {
    let id = task.job_id().to_string();
    setup.ps.start_job(task).unwrap();
    setup.ps.drain().await;
    setup.ps.history(&id).unwrap()
}

fn assert_close(got: &[f32], want: &[f32]) {
    assert_eq!(got.len(), want.len());
    for (g, w) in got.iter().zip(want) {
        assert!((g - w).abs() < 1e-5, "{got:?} != {want:?}");
    }
}

#[tokio::test(start_paused = true)]
async fn single_static_epoch_aggregates_every_worker() {
    let setup = setup(LocalCluster::default(), MockScheduler::new(Some(5)), function);
    let history = run(&setup, task("job00001", 1, 2, static_options())).await;

    assert_eq!(history.status, JobStatus::Finished);
    assert_eq!(history.data.len(), 1);
    assert_eq!(setup.cluster.created(), 2);
    assert!(setup.cluster.live_pods().is_empty());
    assert_eq!(setup.scheduler.updates(), 0);
    assert_eq!(*setup.scheduler.finished.lock(), vec!["job00001".to_string()]);

    let (weights, bias) = setup.store.read_layer(LAYER, "job00001").unwrap();
    assert_close(weights.values(), &[4.8, 4.6]);
    assert_close(bias.values(), &[-0.2]);

    // only the saved layer is left, the gradients were cleared
    assert_eq!(setup.store.len(), 2);
    assert_eq!(setup.ps.status("job00001"), Some(JobStatus::Finished));
}

#[tokio::test(start_paused = true)]
async fn static_parallelism_never_asks_the_scheduler() {
    let setup = setup(LocalCluster::default(), MockScheduler::new(Some(5)), function);
    let history = run(&setup, task("job00002", 3, 2, static_options())).await;

    assert_eq!(history.status, JobStatus::Finished);
    assert_eq!(setup.scheduler.updates(), 0);
    assert_eq!(history.data.parallelism(), &[2., 2., 2.]);
    assert_eq!(setup.cluster.created(), 6);
}

#[tokio::test(start_paused = true)]
async fn mismatched_gradient_fails_the_job_and_keeps_the_model() {
    let setup = setup(LocalCluster::default(), MockScheduler::new(None), |store| MockFunction {
        bad_worker: Some(1),
        ..function(store)
    });
    let history = run(&setup, task("job00003", 2, 2, static_options())).await;

    assert_eq!(history.status, JobStatus::Failed);
    assert!(history.error.unwrap().contains("worker 1"));
    assert!(history.data.is_empty());

    let (weights, bias) = setup.store.read_layer(LAYER, "job00003").unwrap();
    assert_eq!(weights.values(), &[5., 5.]);
    assert_eq!(bias.values(), &[0.]);
    assert!(setup.cluster.live_pods().is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_worker_reduces_the_parallelism() {
    let cluster = LocalCluster::default();
    cluster.script(PodBehavior::Fail {
        after: Duration::ZERO,
    });

    let setup = setup(cluster, MockScheduler::new(None), function);
    let history = run(&setup, task("job00004", 1, 2, static_options())).await;

    assert_eq!(history.status, JobStatus::Finished);
    assert_eq!(history.data.parallelism(), &[1.]);
    assert_eq!(setup.cluster.created(), 3);

    let (weights, _) = setup.store.read_layer(LAYER, "job00004").unwrap();
    assert_close(weights.values(), &[4.9, 4.8]);
}

#[tokio::test(start_paused = true)]
async fn timed_out_worker_retries_at_the_same_parallelism() {
    let cluster = LocalCluster::default();
    cluster.script(PodBehavior::Hang);

    let setup = setup(cluster, MockScheduler::new(None), function);
    let history = run(&setup, task("job00005", 1, 2, static_options())).await;

    assert_eq!(history.status, JobStatus::Finished);
    assert_eq!(history.data.parallelism(), &[2.]);
    assert_eq!(setup.cluster.created(), 4);
    assert!(setup.cluster.live_pods().is_empty());
}

/// A function whose worker 1 misbehaves once.
fn faulty(fault: Fault) -> impl FnOnce(Arc<MemoryStore>) -> MockFunction {
    move |store| MockFunction {
        fault: Some(fault),
        faults: AtomicUsize::new(1),
        ..function(store)
    }
}

#[tokio::test(start_paused = true)]
async fn missing_gradient_retries_at_the_same_parallelism() {
    let setup = setup(LocalCluster::default(), MockScheduler::new(None), faulty(Fault::Silent));
    let history = run(&setup, task("job00014", 1, 2, static_options())).await;

    assert_eq!(history.status, JobStatus::Finished);
    assert_eq!(history.data.parallelism(), &[2.]);
    assert_eq!(setup.cluster.created(), 4);
    assert!(history.data.epoch_duration()[0] >= ParameterServerConfig::default().gradient_timeout.as_secs_f64());

    // the gradient of the first attempt's worker 0 was discarded
    let (weights, _) = setup.store.read_layer(LAYER, "job00014").unwrap();
    assert_close(weights.values(), &[4.8, 4.6]);
    assert_eq!(setup.store.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn stalled_epoch_retries_at_the_same_parallelism() {
    let epoch_timeout = ParameterServerConfig::default().epoch_timeout;
    let stall = Fault::Stall(epoch_timeout * 2);

    let setup = setup(LocalCluster::default(), MockScheduler::new(None), faulty(stall));
    let history = run(&setup, task("job00015", 1, 2, static_options())).await;

    assert_eq!(history.status, JobStatus::Finished);
    assert_eq!(history.data.parallelism(), &[2.]);
    assert_eq!(setup.cluster.created(), 4);
    assert!(history.data.epoch_duration()[0] >= epoch_timeout.as_secs_f64());
    assert!(history.data.epoch_duration()[0] < (epoch_timeout * 2).as_secs_f64());
    assert!(setup.cluster.live_pods().is_empty());
}

#[tokio::test(start_paused = true)]
async fn train_error_counts_as_a_failed_worker() {
    let setup = setup(LocalCluster::default(), MockScheduler::new(None), faulty(Fault::Error));
    let history = run(&setup, task("job00016", 1, 2, static_options())).await;

    assert_eq!(history.status, JobStatus::Finished);
    assert_eq!(history.data.parallelism(), &[1.]);
    assert_eq!(setup.cluster.created(), 3);

    let (weights, _) = setup.store.read_layer(LAYER, "job00016").unwrap();
    assert_close(weights.values(), &[4.9, 4.8]);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_fail_the_job() {
    let setup = setup(LocalCluster::new(PodBehavior::Hang), MockScheduler::new(None), function);
    let history = run(&setup, task("job00006", 2, 1, static_options())).await;

    assert_eq!(history.status, JobStatus::Failed);
    assert!(history.error.unwrap().contains("after 3 tries"));
    assert_eq!(setup.cluster.created(), 3);
    assert!(setup.cluster.live_pods().is_empty());
    assert_eq!(setup.ps.status("job00006"), Some(JobStatus::Failed));
}

#[tokio::test(start_paused = true)]
async fn scheduler_decisions_apply_to_the_next_epoch() {
    let setup = setup(LocalCluster::default(), MockScheduler::new(Some(3)), function);
    let history = run(&setup, task("job00007", 3, 2, TrainOptions::default())).await;

    assert_eq!(history.status, JobStatus::Finished);
    assert_eq!(setup.scheduler.updates(), 2);
    assert_eq!(history.data.parallelism(), &[2., 3., 3.]);
    assert_eq!(setup.cluster.created(), 8);
}

#[tokio::test(start_paused = true)]
async fn unreachable_scheduler_keeps_the_last_parallelism() {
    let setup = setup(LocalCluster::default(), MockScheduler::new(None), function);
    let history = run(&setup, task("job00008", 2, 2, TrainOptions::default())).await;

    assert_eq!(history.status, JobStatus::Finished);
    assert_eq!(setup.scheduler.updates(), 4);
    assert_eq!(history.data.parallelism(), &[2., 2.]);
}

#[tokio::test(start_paused = true)]
async fn unanswered_schedule_requests_time_out() {
    let setup = setup(LocalCluster::default(), MockScheduler::silent(), function);
    let history = run(&setup, task("job00017", 2, 2, TrainOptions::default())).await;

    assert_eq!(history.status, JobStatus::Finished);
    // every try could arm the rendezvous again, so each timeout disarmed it
    assert_eq!(setup.scheduler.updates(), 4);
    assert_eq!(history.data.parallelism(), &[2., 2.]);

    // a late answer finds no job to deliver to
    assert!(setup.ps.deliver("job00017", ScheduleResponse { parallelism: 3 }).is_err());
}

#[tokio::test(start_paused = true)]
async fn sync_period_spaces_the_schedule_requests() {
    let setup = setup(LocalCluster::default(), MockScheduler::new(Some(1)), function);
    let options = TrainOptions {
        k: 2,
        ..Default::default()
    };
    let history = run(&setup, task("job00009", 5, 2, options)).await;

    assert_eq!(history.status, JobStatus::Finished);
    assert_eq!(setup.scheduler.updates(), 2);
    assert_eq!(history.data.parallelism(), &[2., 2., 1., 1., 1.]);
}

#[tokio::test(start_paused = true)]
async fn history_carries_the_last_validation_forward() {
    let setup = setup(LocalCluster::default(), MockScheduler::new(None), |store| MockFunction {
        accuracy: 0.7,
        ..function(store)
    });
    let options = TrainOptions {
        validate_every: 2,
        ..static_options()
    };
    let history = run(&setup, task("job00010", 3, 1, options)).await;

    let data = &history.data;
    assert_eq!(data.len(), 3);
    assert_eq!(data.validation_loss(), &[0., 0.5, 0.5]);
    assert_eq!(data.accuracy(), &[0., 0.7, 0.7]);
    assert_eq!(data.train_loss(), &[1., 0.5, 1. / 3.]);
    assert_eq!(data.epoch_duration().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn reaching_the_goal_accuracy_finishes_early() {
    let setup = setup(LocalCluster::default(), MockScheduler::new(None), |store| MockFunction {
        accuracy: 0.9,
        ..function(store)
    });
    let options = TrainOptions {
        goal_accuracy: 0.8,
        ..static_options()
    };
    let history = run(&setup, task("job00011", 10, 1, options)).await;

    assert_eq!(history.status, JobStatus::Finished);
    assert_eq!(history.data.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn routes_answer_unknown_jobs_with_client_errors() {
    let setup = setup(LocalCluster::default(), MockScheduler::new(None), function);

    let update = Request::new(
        Route::Update {
            job_id: "ghost".to_string(),
        },
        r#"{"parallelism":2}"#,
    );
    assert_eq!(setup.ps.handle(update).await.status, Status::BadRequest);

    let malformed = Request::new(
        Route::Update {
            job_id: "ghost".to_string(),
        },
        "{",
    );
    assert_eq!(setup.ps.handle(malformed).await.status, Status::BadRequest);

    let status = Request::new(
        Route::Status {
            job_id: "ghost".to_string(),
        },
        "",
    );
    assert_eq!(setup.ps.handle(status).await.status, Status::NotFound);

    let health = Request::new(Route::Health, "");
    assert_eq!(setup.ps.handle(health).await.status, Status::Ok);
}

#[tokio::test(start_paused = true)]
async fn start_route_runs_the_job() {
    let setup = setup(LocalCluster::default(), MockScheduler::new(None), function);
    let body = serde_json::to_string(&task("job00012", 1, 1, static_options())).unwrap();

    let response = setup.ps.handle(Request::new(Route::Start, body)).await;
    assert_eq!(response.status, Status::Ok);
    assert_eq!(response.body, "job00012");

    setup.ps.drain().await;

    let status = Request::new(
        Route::Status {
            job_id: "job00012".to_string(),
        },
        "",
    );
    let response = setup.ps.handle(status).await;
    let body: parameter_server::service::JobStatusBody = serde_json::from_str(&response.body).unwrap();
    assert_eq!(body.status, JobStatus::Finished);
    assert_eq!(body.history.unwrap().data.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_running_jobs() {
    let setup = setup(LocalCluster::new(PodBehavior::Hang), MockScheduler::new(None), function);
    setup.ps.start_job(task("job00013", 1, 1, static_options())).unwrap();

    tokio::task::yield_now().await;
    setup.ps.shutdown().await;

    let history = setup.ps.history("job00013").unwrap();
    assert_eq!(history.status, JobStatus::Failed);
    assert_eq!(history.error.as_deref(), Some("the job was cancelled"));
    assert!(setup.cluster.live_pods().is_empty());
}
