use std::fmt;

use serde::{Deserialize, Serialize};

/// The key of a tensor inside the parameter store.
///
/// Rendered as `{layer}[-bias][-grad]-{psId}[-{funcId}]`, the parameter server id
/// being the job id and the function id the worker id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TensorKey {
    layer: String,
    bias: bool,
    ps_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    func_id: Option<usize>,
}

impl TensorKey {
    /// The weights of a layer.
    pub fn weights(layer: &str, ps_id: &str) -> Self {
        Self::new(layer, false, ps_id, None)
    }

    /// The bias of a layer.
    pub fn bias(layer: &str, ps_id: &str) -> Self {
        Self::new(layer, true, ps_id, None)
    }

    /// The weights gradient of a layer computed by a worker.
    pub fn weights_grad(layer: &str, ps_id: &str, func_id: usize) -> Self {
        Self::new(layer, false, ps_id, Some(func_id))
    }

    /// The bias gradient of a layer computed by a worker.
    pub fn bias_grad(layer: &str, ps_id: &str, func_id: usize) -> Self {
        Self::new(layer, true, ps_id, Some(func_id))
    }

    fn new(layer: &str, bias: bool, ps_id: &str, func_id: Option<usize>) -> Self {
        Self {
            layer: layer.to_string(),
            bias,
            ps_id: ps_id.to_string(),
            func_id,
        }
    }

    pub fn is_grad(&self) -> bool {
        self.func_id.is_some()
    }
}

impl fmt::Display for TensorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.layer)?;

        if self.bias {
            f.write_str("-bias")?;
        }

        if self.is_grad() {
            f.write_str("-grad")?;
        }

        write!(f, "-{}", self.ps_id)?;

        if let Some(func_id) = self.func_id {
            write!(f, "-{func_id}")?;
        }

        Ok(())
    }
}

/// A tensor on the wire, a flat row major buffer and its shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorBody {
    pub shape: Vec<usize>,
    pub values: Vec<f32>,
}

/// The body of a `POST /tensor/write`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorWrite {
    pub key: TensorKey,
    #[serde(flatten)]
    pub tensor: TensorBody,
}

/// An operation on the parameter store exposed by the parameter server.
///
/// Every operation but `Write` takes a json `TensorKey` as its body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorOp {
    /// Answers the `TensorBody`, or a 404 if nothing is stored under the key.
    Read,
    /// Takes a `TensorWrite`.
    Write,
    /// Answers `true` or `false`.
    Contains,
    /// Answers whether there was a tensor to remove.
    Remove,
}

impl TensorOp {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "read" => Some(Self::Read),
            "write" => Some(Self::Write),
            "contains" => Some(Self::Contains),
            "remove" => Some(Self::Remove),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Contains => "contains",
            Self::Remove => "remove",
        }
    }
}
