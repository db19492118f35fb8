use serde::{Deserialize, Serialize};

use super::JobHistory;

/// Sent by users to start a new training job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainRequest {
    pub model_type: String,
    pub batch_size: usize,
    pub epochs: usize,
    pub dataset: String,
    #[serde(rename = "lr")]
    pub learning_rate: f32,
    pub function_name: String,
    #[serde(default)]
    pub options: TrainOptions,
}

/// Extra configuration of a training job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainOptions {
    pub default_parallelism: usize,
    pub static_parallelism: bool,
    pub validate_every: usize,
    /// Amount of epochs between two parallelism synchronizations with the scheduler.
    pub k: i32,
    /// Accuracy objective, reaching it finishes the training.
    pub goal_accuracy: f64,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            default_parallelism: 1,
            static_parallelism: false,
            validate_every: 1,
            k: 1,
            goal_accuracy: 0.,
        }
    }
}

impl TrainOptions {
    /// The synchronization period, values below one mean every epoch.
    pub fn sync_period(&self) -> usize {
        self.k.max(1) as usize
    }
}

/// The training specific variables of a job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct JobState {
    pub parallelism: usize,
    /// Cumulative training time in seconds.
    pub elapsed_time: f64,
}

/// Identity and progress of the job responsible for a `TrainRequest`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobInfo {
    pub id: String,
    pub state: JobState,
    #[serde(default, skip_serializing_if = "JobHistory::is_empty")]
    pub history: JobHistory,
}

/// The main object exchanged by the scheduler and the parameter server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainTask {
    #[serde(rename = "request")]
    pub parameters: TrainRequest,
    #[serde(default)]
    pub job: JobInfo,
}

impl TrainTask {
    pub fn new(parameters: TrainRequest, job_id: impl Into<String>, parallelism: usize) -> Self {
        Self {
            parameters,
            job: JobInfo {
                id: job_id.into(),
                state: JobState {
                    parallelism,
                    elapsed_time: 0.,
                },
                history: JobHistory::default(),
            },
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job.id
    }
}
