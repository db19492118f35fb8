mod api;
mod pserver;

pub use api::JobStatusBody;
pub use pserver::ParameterServer;
