//! Routes and status codes of the control protocol spoken between the scheduler,
//! the parameter server and the serverless functions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::specs::{FunctionTask, TensorOp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
}

/// Every endpoint of the system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// `GET /health`
    Health,
    /// `POST /train`, submits a `TrainRequest` to the scheduler.
    Train,
    /// `POST /job`, a parameter server asks for a new parallelism.
    Job,
    /// `POST /finish/{jobId}`, a job reached a terminal state.
    Finish { job_id: String },
    /// `POST /start`, the scheduler hands a new `TrainTask` to the parameter server.
    Start,
    /// `POST /update/{jobId}`, the scheduler answers a parallelism request.
    Update { job_id: String },
    /// `GET /status/{jobId}`
    Status { job_id: String },
    /// `POST /function/{task}`, triggers a serverless function.
    Function(FunctionTask),
    /// `POST /tensor/{op}`, reaches the parameter store behind a parameter server.
    Tensor(TensorOp),
}

impl Route {
    /// Parses a method and a path into a `Route`.
    ///
    /// # Returns
    /// The route or `None` if nothing matches.
    pub fn parse(method: Method, path: &str) -> Option<Self> {
        let path = path.trim_end_matches('/');
        let mut segments = path.strip_prefix('/')?.split('/');
        let first = segments.next()?;
        let second = segments.next();

        if segments.next().is_some() {
            return None;
        }

        let route = match (method, first, second) {
            (Method::Get, "health", None) => Route::Health,
            (Method::Post, "train", None) => Route::Train,
            (Method::Post, "job", None) => Route::Job,
            (Method::Post, "start", None) => Route::Start,
            (Method::Post, "finish", Some(id)) if !id.is_empty() => Route::Finish {
                job_id: id.to_string(),
            },
            (Method::Post, "update", Some(id)) if !id.is_empty() => Route::Update {
                job_id: id.to_string(),
            },
            (Method::Get, "status", Some(id)) if !id.is_empty() => Route::Status {
                job_id: id.to_string(),
            },
            (Method::Post, "function", Some(task)) => Route::Function(FunctionTask::parse(task)?),
            (Method::Post, "tensor", Some(op)) => Route::Tensor(TensorOp::parse(op)?),
            _ => return None,
        };

        Some(route)
    }

    pub fn method(&self) -> Method {
        match self {
            Route::Health | Route::Status { .. } => Method::Get,
            _ => Method::Post,
        }
    }

    pub fn path(&self) -> String {
        match self {
            Route::Health => "/health".to_string(),
            Route::Train => "/train".to_string(),
            Route::Job => "/job".to_string(),
            Route::Start => "/start".to_string(),
            Route::Finish { job_id } => format!("/finish/{job_id}"),
            Route::Update { job_id } => format!("/update/{job_id}"),
            Route::Status { job_id } => format!("/status/{job_id}"),
            Route::Function(task) => format!("/function/{}", task.as_str()),
            Route::Tensor(op) => format!("/tensor/{}", op.as_str()),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let method = match self.method() {
            Method::Get => "GET",
            Method::Post => "POST",
        };

        write!(f, "{method} {}", self.path())
    }
}

/// The subset of http status codes used by the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    BadRequest,
    NotFound,
    InternalError,
    /// The component can't take the request right now, retrying later may succeed.
    Unavailable,
}

impl Status {
    pub fn code(self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::BadRequest => 400,
            Status::NotFound => 404,
            Status::InternalError => 500,
            Status::Unavailable => 503,
        }
    }

    /// Maps a raw code back into a `Status`, unknown codes are treated as server errors.
    pub fn from_code(code: u16) -> Self {
        match code {
            200..=299 => Status::Ok,
            404 => Status::NotFound,
            400..=499 => Status::BadRequest,
            503 => Status::Unavailable,
            _ => Status::InternalError,
        }
    }

    pub fn is_success(self) -> bool {
        self == Status::Ok
    }
}

/// A routed request.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub route: Route,
    pub body: String,
}

impl Request {
    pub fn new(route: Route, body: impl Into<String>) -> Self {
        Self {
            route,
            body: body.into(),
        }
    }

    /// Deserializes the json body of the request.
    pub fn json<'a, T: Deserialize<'a>>(&'a self) -> serde_json::Result<T> {
        serde_json::from_str(&self.body)
    }
}

/// The answer to a `Request`.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: Status,
    pub body: String,
}

impl Response {
    pub fn new(status: Status, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(Status::Ok, body)
    }

    pub fn bad_request(reason: impl fmt::Display) -> Self {
        Self::new(Status::BadRequest, reason.to_string())
    }

    pub fn not_found(path: &str) -> Self {
        Self::new(Status::NotFound, format!("no route for {path}"))
    }

    pub fn internal(reason: impl fmt::Display) -> Self {
        Self::new(Status::InternalError, reason.to_string())
    }

    /// Builds a successful response from a serializable value.
    pub fn json<T: Serialize>(value: &T) -> Self {
        match serde_json::to_string(value) {
            Ok(body) => Self::ok(body),
            Err(e) => Self::internal(e),
        }
    }
}
