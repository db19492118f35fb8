pub mod config;
pub mod job;
pub mod model;
pub mod service;
pub mod storage;

pub use config::ParameterServerConfig;
pub use job::{HistoryStore, JobContext, JobErr, JobPhase, MemoryHistoryStore, Rendezvous};
pub use model::{Model, ModelErr};
pub use service::ParameterServer;
pub use storage::{MemoryStore, ParameterStore};
