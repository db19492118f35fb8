use async_trait::async_trait;
use comms::{
    proto::{Request, Response, Route, Status},
    server::Handler,
    specs::{History, JobStatus, ScheduleResponse, TensorBody, TensorKey, TensorOp, TensorWrite, TrainTask},
};
use log::warn;
use serde::{Deserialize, Serialize};

use super::ParameterServer;
use crate::{job::RendezvousErr, storage::StoreErr};

/// The body of a `GET /status/{jobId}` answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusBody {
    pub id: String,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<History>,
}

#[async_trait]
impl Handler for ParameterServer {
    async fn handle(&self, request: Request) -> Response {
        match &request.route {
            Route::Health => Response::ok("ok"),
            Route::Start => {
                let task: TrainTask = match request.json() {
                    Ok(task) => task,
                    Err(e) => return Response::bad_request(e),
                };

                let job_id = task.job_id().to_string();
                match self.start_job(task) {
                    Ok(()) => Response::ok(job_id),
                    Err(e) => Response::bad_request(e),
                }
            }
            Route::Update { job_id } => {
                let response: ScheduleResponse = match request.json() {
                    Ok(response) => response,
                    Err(e) => return Response::bad_request(e),
                };

                match self.deliver(job_id, response) {
                    Ok(_) => Response::ok(""),
                    Err(e @ RendezvousErr::UnknownJob(_)) => {
                        warn!(job_id = job_id.as_str(); "schedule response for {e}");
                        Response::bad_request(e)
                    }
                    Err(e) => Response::bad_request(e),
                }
            }
            Route::Status { job_id } => match self.status(job_id) {
                Some(status) => Response::json(&JobStatusBody {
                    id: job_id.clone(),
                    status,
                    history: self.history(job_id),
                }),
                None => Response::not_found(&request.route.path()),
            },
            Route::Tensor(op) => self.tensor(*op, &request),
            route => Response::not_found(&route.path()),
        }
    }
}

impl ParameterServer {
    /// Serves the store to the functions, which run outside of this process.
    fn tensor(&self, op: TensorOp, request: &Request) -> Response {
        let store = self.store();
        let key = || request.json::<TensorKey>();

        match op {
            TensorOp::Write => {
                let write: TensorWrite = match request.json() {
                    Ok(write) => write,
                    Err(e) => return Response::bad_request(e),
                };

                match store.write(&write.key, write.tensor.into()) {
                    Ok(()) => Response::ok(""),
                    Err(e) => {
                        warn!("refused a tensor write: {e}");
                        Response::bad_request(e)
                    }
                }
            }
            TensorOp::Read => match key() {
                Ok(key) => match store.read(&key) {
                    Ok(tensor) => Response::json(&TensorBody::from(tensor)),
                    Err(StoreErr::Missing(key)) => Response::new(Status::NotFound, key),
                    Err(e) => Response::internal(e),
                },
                Err(e) => Response::bad_request(e),
            },
            TensorOp::Contains => key().map_or_else(Response::bad_request, |key| {
                Response::json(&store.contains(&key))
            }),
            TensorOp::Remove => key().map_or_else(Response::bad_request, |key| {
                Response::json(&store.remove(&key))
            }),
        }
    }
}
