use std::{env, io, str::FromStr, time::Duration};

use worker::{LifecycleConfig, WorkerSpec};

/// Timing and retry bounds of the job coordinators.
#[derive(Debug, Clone)]
pub struct ParameterServerConfig {
    /// How long the workers of an epoch may take to finish their train invocation.
    pub epoch_timeout: Duration,
    /// How long to wait for every gradient of an epoch to be in the store.
    pub gradient_timeout: Duration,
    pub gradient_poll: Duration,
    /// How long a single schedule request may wait for its answer.
    pub schedule_timeout: Duration,
    pub schedule_tries: usize,
    pub schedule_backoff: Duration,
    pub backoff_factor: u32,
    pub max_epoch_retries: usize,
    /// Multiplies the learning rate after every validation.
    pub lr_decay: f32,
    pub lifecycle: LifecycleConfig,
    pub worker: WorkerSpec,
}

impl Default for ParameterServerConfig {
    fn default() -> Self {
        Self {
            epoch_timeout: Duration::from_secs(600),
            gradient_timeout: Duration::from_secs(30),
            gradient_poll: Duration::from_millis(100),
            schedule_timeout: Duration::from_secs(10),
            schedule_tries: 4,
            schedule_backoff: Duration::from_millis(500),
            backoff_factor: 2,
            max_epoch_retries: 3,
            lr_decay: 1.,
            lifecycle: LifecycleConfig::default(),
            worker: WorkerSpec::default(),
        }
    }
}

impl ParameterServerConfig {
    /// Reads the configuration from the environment, missing variables keep their default.
    ///
    /// # Returns
    /// The configuration or an error naming the first invalid variable.
    pub fn from_env() -> io::Result<Self> {
        let mut config = Self::default();

        if let Some(secs) = var::<u64>("PS_EPOCH_TIMEOUT_SECS")? {
            config.epoch_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = var::<u64>("PS_GRADIENT_TIMEOUT_SECS")? {
            config.gradient_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = var::<u64>("PS_SCHEDULE_TIMEOUT_SECS")? {
            config.schedule_timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = var("PS_MAX_EPOCH_RETRIES")? {
            config.max_epoch_retries = retries;
        }
        if let Some(decay) = var("PS_LR_DECAY")? {
            config.lr_decay = decay;
        }
        if let Some(secs) = var::<u64>("PS_READY_TIMEOUT_SECS")? {
            config.lifecycle.ready_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = var::<u64>("PS_POLL_INTERVAL_MS")? {
            config.lifecycle.poll_interval = Duration::from_millis(ms);
        }
        if let Ok(image) = env::var("WORKER_IMAGE") {
            config.worker.image = image;
        }
        if let Some(port) = var("WORKER_PORT")? {
            config.worker.port = port;
        }

        Ok(config)
    }
}

/// Parses an environment variable, `None` if it isn't set.
pub(crate) fn var<T: FromStr>(key: &str) -> io::Result<Option<T>> {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_value_is_an_error() {
        // SAFETY: the variable is unique to this test.
        unsafe { env::set_var("PS_TEST_INVALID_RETRIES", "three") };
        assert!(var::<usize>("PS_TEST_INVALID_RETRIES").is_err());

        unsafe { env::set_var("PS_TEST_INVALID_RETRIES", " 3 ") };
        assert_eq!(var::<usize>("PS_TEST_INVALID_RETRIES").unwrap(), Some(3));

        assert_eq!(var::<usize>("PS_TEST_UNSET_RETRIES").unwrap(), None);
    }
}
