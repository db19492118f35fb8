use std::{
    error::Error,
    fmt::{self, Display},
};

/// The specific result type of the storage module.
pub type Result<T> = std::result::Result<T, StoreErr>;

/// Errors returned by a `ParameterStore`.
///
/// A missing key means the tensor may still be written later, while the
/// shape errors mean the data itself is wrong.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreErr {
    /// Nothing was ever written under the key.
    Missing(String),
    /// The key already holds a tensor of another shape.
    ShapeMismatch {
        key: String,
        expected: Vec<usize>,
        got: Vec<usize>,
    },
    /// The amount of values doesn't match the shape.
    Malformed {
        key: String,
        shape: Vec<usize>,
        len: usize,
    },
}

impl StoreErr {
    pub fn is_missing(&self) -> bool {
        matches!(self, StoreErr::Missing(_))
    }
}

impl Display for StoreErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreErr::Missing(key) => write!(f, "ParameterStore error: no tensor under {key}"),
            StoreErr::ShapeMismatch { key, expected, got } => write!(
                f,
                "ParameterStore error: {key} holds shape {expected:?}, tried to write {got:?}"
            ),
            StoreErr::Malformed { key, shape, len } => write!(
                f,
                "ParameterStore error: {key} has shape {shape:?} but {len} values"
            ),
        }
    }
}

impl Error for StoreErr {}
