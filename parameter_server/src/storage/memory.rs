use std::collections::HashMap;

use parking_lot::RwLock;

use super::{ParameterStore, Result, StoreErr, Tensor, TensorKey, store::check_write};

/// A `ParameterStore` living in the process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tensors: RwLock<HashMap<String, Tensor>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The amount of stored tensors.
    pub fn len(&self) -> usize {
        self.tensors.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every stored key, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.tensors.read().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl ParameterStore for MemoryStore {
    fn read(&self, key: &TensorKey) -> Result<Tensor> {
        let key = key.to_string();

        self.tensors
            .read()
            .get(&key)
            .cloned()
            .ok_or(StoreErr::Missing(key))
    }

    fn write(&self, key: &TensorKey, tensor: Tensor) -> Result<()> {
        let name = key.to_string();
        let mut tensors = self.tensors.write();

        check_write(key, tensors.get(&name), &tensor)?;
        tensors.insert(name, tensor);
        Ok(())
    }

    fn remove(&self, key: &TensorKey) -> bool {
        self.tensors.write().remove(&key.to_string()).is_some()
    }

    fn contains(&self, key: &TensorKey) -> bool {
        self.tensors.read().contains_key(&key.to_string())
    }
}
