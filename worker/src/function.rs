use async_trait::async_trait;
use comms::{
    client::Client,
    proto::{Request, Route},
    specs::{FunctionArgs, FunctionTask, InitReport, TrainReport, ValidationReport},
};

use crate::error::FunctionErr;

/// The serverless function of a job, the surface that triggers its work.
///
/// `train` must only return once the worker's gradients are written to the parameter store.
#[async_trait]
pub trait Function: Send + Sync {
    /// Initializes the model's layers in the parameter store.
    async fn init(&self, args: &FunctionArgs) -> Result<InitReport, FunctionErr>;

    /// Runs one epoch on a worker.
    async fn train(&self, args: &FunctionArgs) -> Result<TrainReport, FunctionErr>;

    /// Evaluates the current model on the validation set.
    async fn validate(&self, args: &FunctionArgs) -> Result<ValidationReport, FunctionErr>;
}

/// A `Function` reached over the network through its gateway.
#[derive(Debug, Clone)]
pub struct RemoteFunction {
    client: Client,
}

impl RemoteFunction {
    pub fn new(gateway: impl Into<String>) -> Self {
        Self {
            client: Client::new(gateway),
        }
    }

    async fn invoke<T>(&self, task: FunctionTask, args: &FunctionArgs) -> Result<T, FunctionErr>
    where
        T: serde::de::DeserializeOwned,
    {
        let body = serde_json::to_string(args)?;
        let request = Request::new(Route::Function(task), body);

        let body = self.client.call(request).await.map_err(|e| match e {
            comms::ApiErr::Status { body, .. } => FunctionErr::Failed {
                task: task.as_str(),
                reason: body,
            },
            e => FunctionErr::Api(e),
        })?;

        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl Function for RemoteFunction {
    async fn init(&self, args: &FunctionArgs) -> Result<InitReport, FunctionErr> {
        self.invoke(FunctionTask::Init, args).await
    }

    async fn train(&self, args: &FunctionArgs) -> Result<TrainReport, FunctionErr> {
        self.invoke(FunctionTask::Train, args).await
    }

    async fn validate(&self, args: &FunctionArgs) -> Result<ValidationReport, FunctionErr> {
        self.invoke(FunctionTask::Validate, args).await
    }
}
