use serde::{Deserialize, Serialize};

use crate::proto::{Method, Request, Response, Route, Status};

/// The application layer message for the entire system.
///
/// Every exchange is a `Request` answered by exactly one `Response` on the same connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Msg {
    Request {
        method: Method,
        path: String,
        body: String,
    },
    Response {
        status: u16,
        body: String,
    },
}

impl From<&Request> for Msg {
    fn from(req: &Request) -> Self {
        Self::Request {
            method: req.route.method(),
            path: req.route.path(),
            body: req.body.clone(),
        }
    }
}

impl From<Response> for Msg {
    fn from(resp: Response) -> Self {
        Self::Response {
            status: resp.status.code(),
            body: resp.body,
        }
    }
}

impl Msg {
    /// Short description of the message kind, used for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Msg::Request { .. } => "request",
            Msg::Response { .. } => "response",
        }
    }

    /// Tries to turn a raw request message into a routed `Request`.
    ///
    /// # Returns
    /// The routed request, or the `Response` that should be sent back when the message
    /// isn't a request or doesn't match any known route.
    pub fn into_request(self) -> Result<Request, Response> {
        match self {
            Msg::Request { method, path, body } => match Route::parse(method, &path) {
                Some(route) => Ok(Request { route, body }),
                None => Err(Response::not_found(&path)),
            },
            Msg::Response { .. } => Err(Response::new(
                Status::BadRequest,
                "expected a request, got a response",
            )),
        }
    }
}
