use comms::specs::TensorBody;

/// A dense `f32` tensor, a flat row major buffer and its shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Vec<usize>,
    values: Vec<f32>,
}

impl Tensor {
    /// Creates a new `Tensor`, consistency between the shape and the values is
    /// checked by the store when written.
    pub fn new(shape: Vec<usize>, values: Vec<f32>) -> Self {
        Self { shape, values }
    }

    pub fn zeros(shape: Vec<usize>) -> Self {
        let len = shape.iter().product();
        Self::new(shape, vec![0.; len])
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [f32] {
        &mut self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Whether the amount of values is the one the shape describes.
    pub fn is_consistent(&self) -> bool {
        self.shape.iter().product::<usize>() == self.values.len()
    }
}

impl From<TensorBody> for Tensor {
    fn from(body: TensorBody) -> Self {
        Self::new(body.shape, body.values)
    }
}

impl From<Tensor> for TensorBody {
    fn from(tensor: Tensor) -> Self {
        Self {
            shape: tensor.shape,
            values: tensor.values,
        }
    }
}
