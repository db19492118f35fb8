mod error;
mod memory;
mod store;
mod tensor;

pub use error::{Result, StoreErr};
pub use memory::MemoryStore;
pub use store::ParameterStore;
pub use tensor::Tensor;

pub use comms::specs::TensorKey;
