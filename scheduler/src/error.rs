use std::{error::Error, fmt};

use comms::{ApiErr, proto::Status};

#[derive(Debug)]
pub enum SchedulerErr {
    /// The scheduler loop isn't running anymore.
    Closed,
    /// The request can't be scheduled as sent.
    Invalid(String),
    /// Every worker of the cluster is already granted to a running job.
    NoCapacity,
    /// The parameter server refused or missed the new job.
    ParameterServer(ApiErr),
}

impl fmt::Display for SchedulerErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerErr::Closed => f.write_str("the scheduler is closed"),
            SchedulerErr::Invalid(reason) => write!(f, "invalid request: {reason}"),
            SchedulerErr::NoCapacity => f.write_str("the cluster has no free workers"),
            SchedulerErr::ParameterServer(e) => write!(f, "parameter server error: {e}"),
        }
    }
}

impl Error for SchedulerErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SchedulerErr::ParameterServer(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ApiErr> for SchedulerErr {
    fn from(value: ApiErr) -> Self {
        Self::ParameterServer(value)
    }
}

impl From<SchedulerErr> for ApiErr {
    fn from(value: SchedulerErr) -> Self {
        match value {
            SchedulerErr::Closed => ApiErr::Unavailable("scheduler".to_string()),
            SchedulerErr::Invalid(_) => ApiErr::Status {
                status: Status::BadRequest,
                body: value.to_string(),
            },
            SchedulerErr::NoCapacity => ApiErr::Status {
                status: Status::Unavailable,
                body: value.to_string(),
            },
            SchedulerErr::ParameterServer(e) => e,
        }
    }
}
