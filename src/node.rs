use std::{io, sync::Arc};

use comms::{ParameterServerApi, SchedulerApi, server};
use log::info;
use parameter_server::{
    JobContext, MemoryHistoryStore, MemoryStore, ParameterServer, ParameterServerConfig,
    ParameterStore, Rendezvous,
};
use scheduler::{Scheduler, SchedulerConfig, SchedulerHandle};
use tokio::net::TcpListener;
use worker::{Cluster, Function, WorkerLifecycleManager};

/// The scheduler and the parameter server wired together in one process.
pub struct Node {
    scheduler: SchedulerHandle,
    ps: ParameterServer,
}

impl Node {
    /// Builds both components and spawns the scheduler loop.
    ///
    /// # Arguments
    /// * `ps_config` - The job coordinators' configuration.
    /// * `scheduler_config` - The scheduler's capacity and policy.
    /// * `store` - Where models and gradients live.
    /// * `cluster` - Where the workers run.
    /// * `function` - The serverless function the workers run.
    pub fn start(
        ps_config: ParameterServerConfig,
        scheduler_config: &SchedulerConfig,
        store: Arc<dyn ParameterStore>,
        cluster: Arc<dyn Cluster>,
        function: Arc<dyn Function>,
    ) -> Self {
        let (scheduler, handle) = Scheduler::new(scheduler_config);

        let ctx = JobContext {
            store,
            lifecycle: WorkerLifecycleManager::new(cluster, ps_config.lifecycle.poll_interval),
            function,
            scheduler: Arc::new(handle.clone()) as Arc<dyn SchedulerApi>,
            rendezvous: Arc::new(Rendezvous::new()),
            histories: Arc::new(MemoryHistoryStore::new()),
            config: ps_config,
        };

        let ps = ParameterServer::new(ctx);
        tokio::spawn(scheduler.run(Arc::new(ps.clone()) as Arc<dyn ParameterServerApi>));

        Self {
            scheduler: handle,
            ps,
        }
    }

    /// Builds a node keeping its tensors in memory, the functions reach them
    /// through the parameter server's `/tensor` routes.
    pub fn in_memory(
        ps_config: ParameterServerConfig,
        scheduler_config: &SchedulerConfig,
        cluster: Arc<dyn Cluster>,
        function: Arc<dyn Function>,
    ) -> Self {
        let store = Arc::new(MemoryStore::new()) as Arc<dyn ParameterStore>;
        Self::start(ps_config, scheduler_config, store, cluster, function)
    }

    pub fn scheduler(&self) -> &SchedulerHandle {
        &self.scheduler
    }

    pub fn parameter_server(&self) -> &ParameterServer {
        &self.ps
    }

    /// Serves the scheduler and the parameter server routes until one of the listeners fails.
    pub async fn serve(&self, scheduler: TcpListener, ps: TcpListener) -> io::Result<()> {
        info!(
            "scheduler at {}, parameter server at {}",
            scheduler.local_addr()?,
            ps.local_addr()?
        );

        tokio::try_join!(
            server::serve(scheduler, Arc::new(self.scheduler.clone())),
            server::serve(ps, Arc::new(self.ps.clone())),
        )?;

        Ok(())
    }

    /// Cancels the running jobs and waits for their teardown.
    pub async fn shutdown(&self) {
        self.ps.shutdown().await;
    }
}
