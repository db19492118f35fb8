use log::{debug, info};
use parking_lot::Mutex;
use rayon::prelude::*;

use super::{Gradient, Layer, LrScheduler, ModelErr};
use crate::storage::{ParameterStore, TensorKey};

#[derive(Debug)]
struct Inner {
    layers: Vec<Layer>,
    lr: f32,
}

/// The model of a single job, a cached copy of its layers in the store.
///
/// Every mutation happens under one exclusive lock, so gradients of one epoch
/// are aggregated atomically with respect to readers of the model.
#[derive(Debug)]
pub struct Model {
    job_id: String,
    inner: Mutex<Inner>,
    lr_scheduler: LrScheduler,
}

impl Model {
    /// Builds the model from the layers the function initialized in the store.
    ///
    /// # Arguments
    /// * `store` - The store holding the initialized layers.
    /// * `job_id` - The id of the job, used as the parameter server id of every key.
    /// * `layer_names` - The names of the layers, in network order.
    /// * `lr` - The initial learning rate.
    /// * `lr_scheduler` - The learning rate decay applied after each validation.
    ///
    /// # Returns
    /// The model or an error if there are no layers or one of them is missing.
    pub fn build<S: AsRef<str>>(
        store: &dyn ParameterStore,
        job_id: &str,
        layer_names: &[S],
        lr: f32,
        lr_scheduler: LrScheduler,
    ) -> Result<Self, ModelErr> {
        if layer_names.is_empty() {
            return Err(ModelErr::NoLayers);
        }

        let layers = layer_names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                let (weights, bias) = store.read_layer(name, job_id)?;
                Ok(Layer::new(name, weights, bias))
            })
            .collect::<Result<Vec<_>, ModelErr>>()?;

        info!(job_id = job_id, layers = layers.len(), lr = lr; "model built");

        Ok(Self {
            job_id: job_id.to_string(),
            inner: Mutex::new(Inner { layers, lr }),
            lr_scheduler,
        })
    }

    /// Aggregates the gradients of `worker_ids` into the model.
    ///
    /// Every gradient is fetched and checked before the first layer is touched,
    /// so a missing or mismatched gradient leaves the model as it was. Workers
    /// are applied in the given order, layers are updated in parallel.
    ///
    /// # Arguments
    /// * `store` - The store the workers wrote their gradients to.
    /// * `worker_ids` - The workers of the epoch.
    pub fn update(&self, store: &dyn ParameterStore, worker_ids: &[usize]) -> Result<(), ModelErr> {
        let mut inner = self.inner.lock();
        let lr = inner.lr;

        let grads = inner
            .layers
            .iter()
            .map(|layer| self.fetch_gradients(store, layer, worker_ids))
            .collect::<Result<Vec<_>, ModelErr>>()?;

        inner
            .layers
            .par_iter_mut()
            .zip(grads.par_iter())
            .try_for_each(|(layer, grads)| grads.iter().try_for_each(|g| layer.apply(g, lr)))?;

        debug!(job_id = self.job_id.as_str(), workers = worker_ids.len(), lr = lr; "model updated");
        Ok(())
    }

    fn fetch_gradients(
        &self,
        store: &dyn ParameterStore,
        layer: &Layer,
        worker_ids: &[usize],
    ) -> Result<Vec<Gradient>, ModelErr> {
        worker_ids
            .iter()
            .map(|&worker_id| {
                let (weights, bias) = store.read_gradient(&layer.name, &self.job_id, worker_id)?;
                let grad = Gradient {
                    worker_id,
                    weights,
                    bias,
                };

                layer.check(&grad)?;
                Ok(grad)
            })
            .collect()
    }

    /// Writes every layer back to the store.
    pub fn save(&self, store: &dyn ParameterStore) -> Result<(), ModelErr> {
        let inner = self.inner.lock();

        for layer in &inner.layers {
            store.write(&TensorKey::weights(&layer.name, &self.job_id), layer.weights().clone())?;
            store.write(&TensorKey::bias(&layer.name, &self.job_id), layer.bias().clone())?;
        }

        Ok(())
    }

    /// Applies the learning rate decay.
    ///
    /// # Returns
    /// The new learning rate.
    pub fn update_lr(&self) -> f32 {
        let mut inner = self.inner.lock();
        self.lr_scheduler.step(&mut inner.lr);
        inner.lr
    }

    pub fn lr(&self) -> f32 {
        self.inner.lock().lr
    }

    /// Removes the gradients written by `worker_ids`.
    ///
    /// # Returns
    /// The amount of removed tensors.
    pub fn clear_gradients(&self, store: &dyn ParameterStore, worker_ids: &[usize]) -> usize {
        worker_ids
            .iter()
            .flat_map(|&worker_id| self.gradient_keys(worker_id))
            .filter(|key| store.remove(key))
            .count()
    }

    /// The keys a worker is expected to write its gradients to.
    pub fn gradient_keys(&self, worker_id: usize) -> Vec<TensorKey> {
        self.inner
            .lock()
            .layers
            .iter()
            .flat_map(|layer| {
                [
                    TensorKey::weights_grad(&layer.name, &self.job_id, worker_id),
                    TensorKey::bias_grad(&layer.name, &self.job_id, worker_id),
                ]
            })
            .collect()
    }

    /// The workers among `worker_ids` that didn't write every gradient yet.
    pub fn pending_gradients(&self, store: &dyn ParameterStore, worker_ids: &[usize]) -> Vec<usize> {
        worker_ids
            .iter()
            .copied()
            .filter(|&id| !self.gradient_keys(id).iter().all(|key| store.contains(key)))
            .collect()
    }

    /// A copy of the layer named `name`.
    pub fn layer(&self, name: &str) -> Option<Layer> {
        self.inner.lock().layers.iter().find(|l| l.name == name).cloned()
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }
}
