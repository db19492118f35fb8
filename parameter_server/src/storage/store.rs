use super::{Result, StoreErr, Tensor, TensorKey};

/// The shared storage of layer weights, biases and worker gradients.
///
/// Reads and writes are atomic per tensor, there are no transactions across tensors.
pub trait ParameterStore: Send + Sync {
    /// Reads the tensor stored under `key`.
    ///
    /// # Returns
    /// The tensor or `StoreErr::Missing`.
    fn read(&self, key: &TensorKey) -> Result<Tensor>;

    /// Writes a tensor under `key`.
    ///
    /// # Returns
    /// `StoreErr::Malformed` if the tensor's values don't match its shape, or
    /// `StoreErr::ShapeMismatch` if the key holds a tensor of another shape.
    fn write(&self, key: &TensorKey, tensor: Tensor) -> Result<()>;

    /// Removes the tensor under `key`, returns whether there was one.
    fn remove(&self, key: &TensorKey) -> bool;

    fn contains(&self, key: &TensorKey) -> bool;

    /// Reads the weights and bias of a layer.
    fn read_layer(&self, name: &str, job_id: &str) -> Result<(Tensor, Tensor)> {
        let weights = self.read(&TensorKey::weights(name, job_id))?;
        let bias = self.read(&TensorKey::bias(name, job_id))?;
        Ok((weights, bias))
    }

    /// Reads the weights and bias gradient of a layer written by a worker.
    fn read_gradient(&self, name: &str, job_id: &str, worker_id: usize) -> Result<(Tensor, Tensor)> {
        let weights = self.read(&TensorKey::weights_grad(name, job_id, worker_id))?;
        let bias = self.read(&TensorKey::bias_grad(name, job_id, worker_id))?;
        Ok((weights, bias))
    }

    /// Writes a raw buffer with its shape.
    fn write_tensor(&self, key: &TensorKey, shape: &[usize], values: &[f32]) -> Result<()> {
        self.write(key, Tensor::new(shape.to_vec(), values.to_vec()))
    }
}

/// Checks that `tensor` may be written over `existing`.
pub(super) fn check_write(key: &TensorKey, existing: Option<&Tensor>, tensor: &Tensor) -> Result<()> {
    if !tensor.is_consistent() {
        return Err(StoreErr::Malformed {
            key: key.to_string(),
            shape: tensor.shape().to_vec(),
            len: tensor.len(),
        });
    }

    match existing {
        Some(old) if old.shape() != tensor.shape() => Err(StoreErr::ShapeMismatch {
            key: key.to_string(),
            expected: old.shape().to_vec(),
            got: tensor.shape().to_vec(),
        }),
        _ => Ok(()),
    }
}
