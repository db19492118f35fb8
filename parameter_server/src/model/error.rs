use std::{error::Error, fmt};

use crate::storage::StoreErr;

/// Errors building, updating or saving a `Model`.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelErr {
    Store(StoreErr),
    /// A gradient doesn't have the shape of the layer it should update.
    ShapeMismatch {
        layer: String,
        worker_id: usize,
        expected: Vec<usize>,
        got: Vec<usize>,
    },
    /// The model was built without layers.
    NoLayers,
}

impl fmt::Display for ModelErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelErr::Store(e) => write!(f, "{e}"),
            ModelErr::ShapeMismatch {
                layer,
                worker_id,
                expected,
                got,
            } => write!(
                f,
                "gradient of worker {worker_id} for layer {layer} has shape {got:?}, expected {expected:?}"
            ),
            ModelErr::NoLayers => f.write_str("the model has no layers"),
        }
    }
}

impl Error for ModelErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ModelErr::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreErr> for ModelErr {
    fn from(value: StoreErr) -> Self {
        Self::Store(value)
    }
}
