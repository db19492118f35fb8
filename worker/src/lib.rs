pub mod cluster;
pub mod config;
pub mod error;
pub mod function;
pub mod lifecycle;
pub mod local;
pub mod spec;

pub use cluster::{Cluster, PodPhase, PodRef};
pub use config::LifecycleConfig;
pub use error::{FunctionErr, LifecycleErr};
pub use function::{Function, RemoteFunction};
pub use lifecycle::{Readiness, WorkerHandle, WorkerLifecycleManager};
pub use local::{LocalCluster, PodBehavior};
pub use spec::{PodTemplate, Probe, WorkerSpec};
