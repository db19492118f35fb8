use std::fmt;

/// The states a job goes through, from submission to a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Created,
    /// Initializing the model through the function.
    Building,
    Epoch(usize),
    Validating,
    /// Waiting for the scheduler's parallelism decision.
    Scheduling,
    Finished,
    Failed,
}

impl JobPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobPhase::Finished | JobPhase::Failed)
    }
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobPhase::Created => f.write_str("created"),
            JobPhase::Building => f.write_str("building"),
            JobPhase::Epoch(n) => write!(f, "epoch {n}"),
            JobPhase::Validating => f.write_str("validating"),
            JobPhase::Scheduling => f.write_str("scheduling"),
            JobPhase::Finished => f.write_str("finished"),
            JobPhase::Failed => f.write_str("failed"),
        }
    }
}
