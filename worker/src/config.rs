use std::time::Duration;

/// Timing bounds of the worker lifecycle.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// How often the phase of a starting pod is polled.
    pub poll_interval: Duration,
    /// How long a pod may take to reach the running phase.
    pub ready_timeout: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            ready_timeout: Duration::from_secs(20),
        }
    }
}
