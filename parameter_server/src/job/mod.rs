mod error;
mod history;
mod phase;
mod rendezvous;
mod train_job;

pub use error::JobErr;
pub use history::{HistoryStore, MemoryHistoryStore};
pub use phase::JobPhase;
pub use rendezvous::{Delivery, Rendezvous, RendezvousErr};
pub use train_job::{JobContext, TrainJob};
