mod function;
mod history;
mod schedule;
mod task;
mod tensor;

pub use function::{FunctionArgs, FunctionTask, InitReport, TrainReport, ValidationReport};
pub use history::{History, JobHistory, JobStatus, MetricUpdate};
pub use schedule::ScheduleResponse;
pub use task::{JobInfo, JobState, TrainOptions, TrainRequest, TrainTask};
pub use tensor::{TensorBody, TensorKey, TensorOp, TensorWrite};
