/// Multiplies the learning rate by a constant rate every time it's invoked.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LrScheduler {
    rate: f32,
}

impl LrScheduler {
    pub fn new(rate: f32) -> Self {
        Self { rate }
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }

    /// Applies the decay to `lr` in place.
    pub fn step(&self, lr: &mut f32) {
        *lr *= self.rate;
    }
}

impl Default for LrScheduler {
    fn default() -> Self {
        Self::new(1.)
    }
}
