pub mod api;
pub mod config;
pub mod error;
pub mod policy;
pub mod scheduler;
pub mod state;

pub use config::{PolicyConfig, SchedulerConfig};
pub use error::SchedulerErr;
pub use policy::{SchedulingPolicy, ThroughputPolicy};
pub use scheduler::{Scheduler, SchedulerHandle};
pub use state::ClusterState;
