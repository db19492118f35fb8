use async_trait::async_trait;
use log::debug;
use tokio::net::TcpStream;

use crate::{
    ApiErr, ParameterServerApi, SchedulerApi,
    msg::Msg,
    proto::{Request, Route, Status},
    specs::{ScheduleResponse, TensorBody, TensorKey, TensorOp, TensorWrite, TrainRequest, TrainTask},
};

/// Sends requests to a remote component, one connection per request.
#[derive(Debug, Clone)]
pub struct Client {
    addr: String,
}

impl Client {
    /// Creates a new `Client`.
    ///
    /// # Arguments
    /// * `addr` - The network address of the remote component.
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Sends a request and waits for its response.
    ///
    /// # Returns
    /// The body of a successful response, or an `ApiErr` if the exchange failed or
    /// the remote answered with an error status.
    pub async fn call(&self, request: Request) -> Result<String, ApiErr> {
        debug!(addr = self.addr.as_str(); "sending {}", request.route);

        let stream = TcpStream::connect(&self.addr).await?;
        let (rx, tx) = stream.into_split();
        let (mut rx, mut tx) = crate::channel(rx, tx);

        tx.send(&Msg::from(&request)).await?;

        match rx.recv().await? {
            Some(Msg::Response { status, body }) => {
                let status = Status::from_code(status);
                if status.is_success() {
                    Ok(body)
                } else {
                    Err(ApiErr::Status { status, body })
                }
            }
            Some(msg) => Err(ApiErr::Status {
                status: Status::BadRequest,
                body: format!("expected a response, got a {}", msg.kind()),
            }),
            None => Err(ApiErr::Unavailable(self.addr.clone())),
        }
    }

    async fn post_json<T: serde::Serialize>(&self, route: Route, body: &T) -> Result<String, ApiErr> {
        let body = serde_json::to_string(body)?;
        self.call(Request::new(route, body)).await
    }
}

/// A `SchedulerApi` reached over the network.
#[derive(Debug, Clone)]
pub struct RemoteScheduler(Client);

impl RemoteScheduler {
    pub fn new(addr: impl Into<String>) -> Self {
        Self(Client::new(addr))
    }
}

#[async_trait]
impl SchedulerApi for RemoteScheduler {
    async fn submit(&self, request: TrainRequest) -> Result<String, ApiErr> {
        self.0.post_json(Route::Train, &request).await
    }

    async fn update_job(&self, task: &TrainTask) -> Result<(), ApiErr> {
        self.0.post_json(Route::Job, task).await.map(drop)
    }

    async fn finish_job(&self, job_id: &str) -> Result<(), ApiErr> {
        let route = Route::Finish {
            job_id: job_id.to_string(),
        };

        self.0.call(Request::new(route, "")).await.map(drop)
    }
}

/// A `ParameterServerApi` reached over the network.
#[derive(Debug, Clone)]
pub struct RemoteParameterServer(Client);

impl RemoteParameterServer {
    pub fn new(addr: impl Into<String>) -> Self {
        Self(Client::new(addr))
    }
}

#[async_trait]
impl ParameterServerApi for RemoteParameterServer {
    async fn start_job(&self, task: TrainTask) -> Result<(), ApiErr> {
        self.0.post_json(Route::Start, &task).await.map(drop)
    }

    async fn update(&self, job_id: &str, response: ScheduleResponse) -> Result<(), ApiErr> {
        let route = Route::Update {
            job_id: job_id.to_string(),
        };

        self.0.post_json(route, &response).await.map(drop)
    }
}

/// The parameter store of a remote parameter server, as seen by a serverless function.
///
/// Functions read the current layers and write their gradients through it.
#[derive(Debug, Clone)]
pub struct RemoteTensors(Client);

impl RemoteTensors {
    pub fn new(addr: impl Into<String>) -> Self {
        Self(Client::new(addr))
    }

    /// Reads the tensor stored under `key`.
    ///
    /// # Returns
    /// The tensor, `None` if nothing is stored under the key.
    pub async fn read(&self, key: &TensorKey) -> Result<Option<TensorBody>, ApiErr> {
        match self.0.post_json(Route::Tensor(TensorOp::Read), key).await {
            Ok(body) => Ok(Some(serde_json::from_str(&body)?)),
            Err(ApiErr::Status {
                status: Status::NotFound,
                ..
            }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Writes a tensor under `key`, a shape conflict is answered with a client error status.
    pub async fn write(&self, key: &TensorKey, shape: &[usize], values: &[f32]) -> Result<(), ApiErr> {
        let body = TensorWrite {
            key: key.clone(),
            tensor: TensorBody {
                shape: shape.to_vec(),
                values: values.to_vec(),
            },
        };

        self.0.post_json(Route::Tensor(TensorOp::Write), &body).await.map(drop)
    }

    pub async fn contains(&self, key: &TensorKey) -> Result<bool, ApiErr> {
        let body = self.0.post_json(Route::Tensor(TensorOp::Contains), key).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Removes the tensor under `key`, returns whether there was one.
    pub async fn remove(&self, key: &TensorKey) -> Result<bool, ApiErr> {
        let body = self.0.post_json(Route::Tensor(TensorOp::Remove), key).await?;
        Ok(serde_json::from_str(&body)?)
    }
}
