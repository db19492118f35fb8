use std::{error::Error, fmt, io};

use comms::ApiErr;

/// The worker module's result type.
pub type Result<T> = std::result::Result<T, LifecycleErr>;

/// Failures talking to the cluster that hosts the workers.
#[derive(Debug)]
pub enum LifecycleErr {
    AlreadyExists(String),
    NotFound(String),
    /// The cluster api rejected or failed the call.
    Api(String),
}

impl fmt::Display for LifecycleErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleErr::AlreadyExists(name) => write!(f, "pod {name} already exists"),
            LifecycleErr::NotFound(name) => write!(f, "pod {name} not found"),
            LifecycleErr::Api(msg) => write!(f, "cluster api error: {msg}"),
        }
    }
}

impl Error for LifecycleErr {}

/// Boundary conversion for binaries / I/O APIs.
impl From<LifecycleErr> for io::Error {
    fn from(value: LifecycleErr) -> Self {
        io::Error::other(value)
    }
}

/// Failures of a serverless function invocation.
#[derive(Debug)]
pub enum FunctionErr {
    Api(ApiErr),
    /// The function ran but reported an error.
    Failed { task: &'static str, reason: String },
}

impl fmt::Display for FunctionErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionErr::Api(e) => write!(f, "function unreachable: {e}"),
            FunctionErr::Failed { task, reason } => write!(f, "function {task} failed: {reason}"),
        }
    }
}

impl Error for FunctionErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            FunctionErr::Api(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ApiErr> for FunctionErr {
    fn from(value: ApiErr) -> Self {
        Self::Api(value)
    }
}

impl From<serde_json::Error> for FunctionErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Api(ApiErr::Json(value))
    }
}
