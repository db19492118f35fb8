use async_trait::async_trait;
use comms::{
    ApiErr, SchedulerApi,
    proto::{Request, Response, Route},
    server::Handler,
    specs::{TrainRequest, TrainTask},
};

use crate::scheduler::SchedulerHandle;

fn respond(res: Result<String, ApiErr>) -> Response {
    match res {
        Ok(body) => Response::ok(body),
        Err(ApiErr::Status { status, body }) => Response::new(status, body),
        Err(e) => Response::internal(e),
    }
}

#[async_trait]
impl Handler for SchedulerHandle {
    async fn handle(&self, request: Request) -> Response {
        match &request.route {
            Route::Health => Response::ok("ok"),
            Route::Train => match request.json::<TrainRequest>() {
                Ok(req) => respond(self.submit(req).await),
                Err(e) => Response::bad_request(e),
            },
            Route::Job => match request.json::<TrainTask>() {
                Ok(task) => respond(self.update_job(&task).await.map(|_| String::new())),
                Err(e) => Response::bad_request(e),
            },
            Route::Finish { job_id } => {
                respond(self.finish_job(job_id).await.map(|_| String::new()))
            }
            route => Response::not_found(&route.path()),
        }
    }
}
