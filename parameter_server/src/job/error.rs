use std::{error::Error, fmt};

use comms::ApiErr;
use worker::FunctionErr;

use super::RendezvousErr;
use crate::model::ModelErr;

/// The reasons a job fails, or an attempt to reach the scheduler does.
#[derive(Debug)]
pub enum JobErr {
    Function(FunctionErr),
    Model(ModelErr),
    Rendezvous(RendezvousErr),
    Scheduler(ApiErr),
    /// No answer for a schedule request within the timeout.
    ScheduleTimeout,
    /// Every worker of the epoch failed.
    NoWorkers { epoch: usize },
    RetriesExhausted { epoch: usize, tries: usize },
    Cancelled,
    /// A job with this id is already running.
    AlreadyRunning(String),
    /// The task can't be trained as sent.
    InvalidTask(String),
}

impl fmt::Display for JobErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobErr::Function(e) => write!(f, "{e}"),
            JobErr::Model(e) => write!(f, "model error: {e}"),
            JobErr::Rendezvous(e) => write!(f, "{e}"),
            JobErr::Scheduler(e) => write!(f, "scheduler error: {e}"),
            JobErr::ScheduleTimeout => f.write_str("the schedule request timed out"),
            JobErr::NoWorkers { epoch } => write!(f, "no worker left to run epoch {epoch}"),
            JobErr::RetriesExhausted { epoch, tries } => {
                write!(f, "epoch {epoch} failed after {tries} tries")
            }
            JobErr::Cancelled => f.write_str("the job was cancelled"),
            JobErr::AlreadyRunning(id) => write!(f, "job {id} is already running"),
            JobErr::InvalidTask(reason) => write!(f, "invalid task: {reason}"),
        }
    }
}

impl Error for JobErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            JobErr::Function(e) => Some(e),
            JobErr::Model(e) => Some(e),
            JobErr::Rendezvous(e) => Some(e),
            JobErr::Scheduler(e) => Some(e),
            _ => None,
        }
    }
}

impl From<FunctionErr> for JobErr {
    fn from(value: FunctionErr) -> Self {
        Self::Function(value)
    }
}

impl From<ModelErr> for JobErr {
    fn from(value: ModelErr) -> Self {
        Self::Model(value)
    }
}

impl From<RendezvousErr> for JobErr {
    fn from(value: RendezvousErr) -> Self {
        Self::Rendezvous(value)
    }
}

impl From<ApiErr> for JobErr {
    fn from(value: ApiErr) -> Self {
        Self::Scheduler(value)
    }
}
