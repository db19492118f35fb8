mod error;
mod layer;
mod lr;
#[allow(clippy::module_inception)]
mod model;

pub use error::ModelErr;
pub use layer::{Gradient, Layer};
pub use lr::LrScheduler;
pub use model::Model;
