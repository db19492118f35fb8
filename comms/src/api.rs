//! The seams between the control plane components.
//!
//! Each component talks to the other through these traits, either in process through
//! a handle or over the network through the clients in `comms::client`.

use std::{error::Error, fmt, io};

use async_trait::async_trait;

use crate::{
    proto::Status,
    specs::{ScheduleResponse, TrainRequest, TrainTask},
};

/// Errors raised while talking to another component.
#[derive(Debug)]
pub enum ApiErr {
    Io(io::Error),
    Json(serde_json::Error),
    /// The other end answered with a non successful status.
    Status { status: Status, body: String },
    /// The other end isn't running anymore.
    Unavailable(String),
}

impl fmt::Display for ApiErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiErr::Io(e) => write!(f, "io error: {e}"),
            ApiErr::Json(e) => write!(f, "json error: {e}"),
            ApiErr::Status { status, body } => {
                write!(f, "request failed with status {}: {body}", status.code())
            }
            ApiErr::Unavailable(what) => write!(f, "{what} is unavailable"),
        }
    }
}

impl Error for ApiErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ApiErr::Io(e) => Some(e),
            ApiErr::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ApiErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for ApiErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// What the parameter server and the submitters need from the scheduler.
#[async_trait]
pub trait SchedulerApi: Send + Sync {
    /// Submits a new training request.
    ///
    /// # Returns
    /// The identifier of the created job.
    async fn submit(&self, request: TrainRequest) -> Result<String, ApiErr>;

    /// Asks for a new parallelism for a running job, the answer arrives asynchronously
    /// through `ParameterServerApi::update`.
    ///
    /// # Arguments
    /// * `task` - The job's task with its current state and history embedded.
    async fn update_job(&self, task: &TrainTask) -> Result<(), ApiErr>;

    /// Notifies that a job reached a terminal state so its state can be released.
    async fn finish_job(&self, job_id: &str) -> Result<(), ApiErr>;
}

/// What the scheduler needs from the parameter server.
#[async_trait]
pub trait ParameterServerApi: Send + Sync {
    /// Starts the coordinator of a new job.
    async fn start_job(&self, task: TrainTask) -> Result<(), ApiErr>;

    /// Delivers a scheduling decision to the job it was computed for.
    async fn update(&self, job_id: &str, response: ScheduleResponse) -> Result<(), ApiErr>;
}
