use serde::{Deserialize, Serialize};

/// The scheduler's answer to a parallelism request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleResponse {
    pub parallelism: usize,
}
