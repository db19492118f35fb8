use serde::{Deserialize, Serialize};

/// The kind of invocation sent to a serverless function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionTask {
    Init,
    Train,
    #[serde(rename = "val")]
    Validate,
}

impl FunctionTask {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "init" => Some(Self::Init),
            "train" => Some(Self::Train),
            "val" => Some(Self::Validate),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Train => "train",
            Self::Validate => "val",
        }
    }
}

/// The arguments of a function invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionArgs {
    pub job_id: String,
    pub worker_id: usize,
    #[serde(rename = "N")]
    pub n_workers: usize,
    pub epoch: usize,
    pub batch_size: usize,
    pub lr: f32,
    #[serde(rename = "K")]
    pub k: i32,
    pub dataset: String,
    pub function_name: String,
}

/// Returned by the init invocation, the function has written the initial layers into the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitReport {
    pub layers: Vec<String>,
}

/// Returned by a train invocation, the function has written its gradients into the store.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainReport {
    pub loss: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub loss: f64,
    pub accuracy: f64,
}
