use std::{env, io, str::FromStr};

/// Knobs of the `ThroughputPolicy`.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyConfig {
    /// Relative epoch duration change needed to move the parallelism.
    pub speedup_threshold: f64,
    /// Relative train loss change under which the loss is considered flat.
    pub plateau_tolerance: f64,
    /// Amount of epochs the loss must stay flat.
    pub plateau_window: usize,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            speedup_threshold: 0.05,
            plateau_tolerance: 0.01,
            plateau_window: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    /// The amount of workers the cluster can run at once, across jobs.
    pub capacity: usize,
    /// The most workers a single job may get.
    pub max_parallelism: usize,
    /// Size of the scheduler's command queue.
    pub queue: usize,
    pub policy: PolicyConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            capacity: 64,
            max_parallelism: 16,
            queue: 128,
            policy: PolicyConfig::default(),
        }
    }
}

impl SchedulerConfig {
    /// Reads the configuration from the environment, missing variables keep their default.
    ///
    /// # Returns
    /// The configuration or an error naming the first invalid variable.
    pub fn from_env() -> io::Result<Self> {
        let mut config = Self::default();

        if let Some(capacity) = var("SCHEDULER_CAPACITY")? {
            config.capacity = capacity;
        }
        if let Some(max) = var("SCHEDULER_MAX_PARALLELISM")? {
            config.max_parallelism = max;
        }
        if let Some(threshold) = var("SCHEDULER_SPEEDUP_THRESHOLD")? {
            config.policy.speedup_threshold = threshold;
        }
        if let Some(tolerance) = var("SCHEDULER_PLATEAU_TOLERANCE")? {
            config.policy.plateau_tolerance = tolerance;
        }
        if let Some(window) = var("SCHEDULER_PLATEAU_WINDOW")? {
            config.policy.plateau_window = window;
        }

        if config.capacity == 0 || config.max_parallelism == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "the scheduler capacity and max parallelism must be positive",
            ));
        }

        Ok(config)
    }
}

fn var<T: FromStr>(key: &str) -> io::Result<Option<T>> {
    let Ok(raw) = env::var(key) else {
        return Ok(None);
    };

    raw.trim().parse().map(Some).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid value for {key}: {raw:?}"),
        )
    })
}
