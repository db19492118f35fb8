use std::{error::Error, fmt};

use serde::{Deserialize, Serialize};

use super::TrainRequest;

/// One epoch worth of training metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricUpdate {
    #[serde(rename = "validations_loss")]
    pub validation_loss: f64,
    pub accuracy: f64,
    pub train_loss: f64,
    pub parallelism: f64,
    pub epoch_duration: f64,
}

/// The metrics of a training job epoch to epoch.
///
/// The five series are only appended together through `push`, so they always have the same length.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawHistory")]
pub struct JobHistory {
    validation_loss: Vec<f64>,
    accuracy: Vec<f64>,
    train_loss: Vec<f64>,
    parallelism: Vec<f64>,
    epoch_duration: Vec<f64>,
}

impl JobHistory {
    /// Appends an epoch sample to every series.
    pub fn push(&mut self, update: MetricUpdate) {
        self.validation_loss.push(update.validation_loss);
        self.accuracy.push(update.accuracy);
        self.train_loss.push(update.train_loss);
        self.parallelism.push(update.parallelism);
        self.epoch_duration.push(update.epoch_duration);
    }

    /// The amount of recorded epochs.
    pub fn len(&self) -> usize {
        self.train_loss.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the sample recorded `back` epochs ago, `0` being the latest.
    pub fn nth_back(&self, back: usize) -> Option<MetricUpdate> {
        let i = self.len().checked_sub(back + 1)?;

        Some(MetricUpdate {
            validation_loss: self.validation_loss[i],
            accuracy: self.accuracy[i],
            train_loss: self.train_loss[i],
            parallelism: self.parallelism[i],
            epoch_duration: self.epoch_duration[i],
        })
    }

    pub fn last(&self) -> Option<MetricUpdate> {
        self.nth_back(0)
    }

    pub fn validation_loss(&self) -> &[f64] {
        &self.validation_loss
    }

    pub fn accuracy(&self) -> &[f64] {
        &self.accuracy
    }

    pub fn train_loss(&self) -> &[f64] {
        &self.train_loss
    }

    pub fn parallelism(&self) -> &[f64] {
        &self.parallelism
    }

    pub fn epoch_duration(&self) -> &[f64] {
        &self.epoch_duration
    }
}

#[derive(Deserialize)]
struct RawHistory {
    #[serde(default)]
    validation_loss: Vec<f64>,
    #[serde(default)]
    accuracy: Vec<f64>,
    #[serde(default)]
    train_loss: Vec<f64>,
    #[serde(default)]
    parallelism: Vec<f64>,
    #[serde(default)]
    epoch_duration: Vec<f64>,
}

/// Returned when deserializing a history whose series have different lengths.
#[derive(Debug)]
pub struct RaggedHistoryErr;

impl fmt::Display for RaggedHistoryErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("JobHistory error: every series must have the same length")
    }
}

impl Error for RaggedHistoryErr {}

impl TryFrom<RawHistory> for JobHistory {
    type Error = RaggedHistoryErr;

    fn try_from(raw: RawHistory) -> Result<Self, Self::Error> {
        let len = raw.train_loss.len();
        let lens = [
            raw.validation_loss.len(),
            raw.accuracy.len(),
            raw.parallelism.len(),
            raw.epoch_duration.len(),
        ];

        if lens.iter().any(|&l| l != len) {
            return Err(RaggedHistoryErr);
        }

        Ok(Self {
            validation_loss: raw.validation_loss,
            accuracy: raw.accuracy,
            train_loss: raw.train_loss,
            parallelism: raw.parallelism,
            epoch_duration: raw.epoch_duration,
        })
    }
}

/// The lifecycle status of a job as seen from the outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Finished,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

/// The persisted record of a finished job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct History {
    pub id: String,
    pub task: TrainRequest,
    #[serde(default)]
    pub data: JobHistory,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
