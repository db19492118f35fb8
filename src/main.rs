use std::sync::Arc;

use elastic_orchestra::{Node, NodeConfig};
use log::info;
use parameter_server::ParameterServerConfig;
use scheduler::SchedulerConfig;
use tokio::{net::TcpListener, signal};
use worker::{LocalCluster, RemoteFunction};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = NodeConfig::from_env()?;
    let ps_config = ParameterServerConfig::from_env()?;
    let scheduler_config = SchedulerConfig::from_env()?;

    let node = Node::in_memory(
        ps_config,
        &scheduler_config,
        Arc::new(LocalCluster::default()),
        Arc::new(RemoteFunction::new(config.function_addr.clone())),
    );

    let scheduler = TcpListener::bind(config.scheduler_addr()).await?;
    let ps = TcpListener::bind(config.ps_addr()).await?;

    tokio::select! {
        res = node.serve(scheduler, ps) => res?,
        _ = signal::ctrl_c() => info!("interrupted"),
    }

    node.shutdown().await;
    Ok(())
}
