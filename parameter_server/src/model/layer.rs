use crate::storage::Tensor;

use super::ModelErr;

/// The weights and bias of a layer of the network.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub name: String,
    weights: Tensor,
    bias: Tensor,
}

/// One worker's contribution to a layer for one epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradient {
    pub worker_id: usize,
    pub weights: Tensor,
    pub bias: Tensor,
}

impl Layer {
    pub fn new(name: impl Into<String>, weights: Tensor, bias: Tensor) -> Self {
        Self {
            name: name.into(),
            weights,
            bias,
        }
    }

    pub fn weights(&self) -> &Tensor {
        &self.weights
    }

    pub fn bias(&self) -> &Tensor {
        &self.bias
    }

    /// Checks that `grad` has exactly the shapes of this layer.
    pub fn check(&self, grad: &Gradient) -> Result<(), ModelErr> {
        let pairs = [(&self.weights, &grad.weights), (&self.bias, &grad.bias)];

        for (param, g) in pairs {
            if param.shape() != g.shape() || !g.is_consistent() {
                return Err(ModelErr::ShapeMismatch {
                    layer: self.name.clone(),
                    worker_id: grad.worker_id,
                    expected: param.shape().to_vec(),
                    got: g.shape().to_vec(),
                });
            }
        }

        Ok(())
    }

    /// Applies one gradient descent step, `weights -= lr * grad.weights` and
    /// `bias -= lr * grad.bias`.
    ///
    /// # Returns
    /// A `ModelErr::ShapeMismatch` if the shapes differ, in which case the layer is untouched.
    pub fn apply(&mut self, grad: &Gradient, lr: f32) -> Result<(), ModelErr> {
        self.check(grad)?;

        let pairs = [
            (&grad.weights, &mut self.weights),
            (&grad.bias, &mut self.bias),
        ];

        for (g, param) in pairs {
            for (p, g) in param.values_mut().iter_mut().zip(g.values()) {
                *p -= lr * g;
            }
        }

        Ok(())
    }
}
