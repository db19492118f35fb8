use std::ops::Range;

use comms::specs::{JobHistory, JobState, ScheduleResponse, TrainRequest};

use crate::{config::PolicyConfig, state::ClusterState};

/// Decides how many workers each job gets.
///
/// Implementations must be pure: the same inputs always give the same decision.
pub trait SchedulingPolicy: Send + Sync {
    /// The parallelism of a newly submitted job, 0 when the cluster can't fit it.
    fn initial(&self, request: &TrainRequest, cluster: &ClusterState) -> usize;

    /// The parallelism of a running job's next epochs.
    ///
    /// # Arguments
    /// * `job_id` - The job asking for a decision.
    /// * `state` - The job's current state.
    /// * `history` - The metrics of every epoch the job ran.
    /// * `cluster` - Every active job, including this one if it's known.
    fn decide(
        &self,
        job_id: &str,
        state: &JobState,
        history: &JobHistory,
        cluster: &ClusterState,
    ) -> ScheduleResponse;
}

/// Grows a job while its epochs get faster and shrinks it when they get
/// slower or its loss stops improving.
#[derive(Debug, Clone)]
pub struct ThroughputPolicy {
    config: PolicyConfig,
    max_parallelism: usize,
}

impl ThroughputPolicy {
    pub fn new(config: PolicyConfig, max_parallelism: usize) -> Self {
        Self {
            config,
            max_parallelism: max_parallelism.max(1),
        }
    }

    /// The most workers a job may hold, 0 when the others already use the whole cluster.
    fn limit(&self, job_id: &str, cluster: &ClusterState) -> usize {
        self.max_parallelism.min(cluster.available_for(job_id))
    }

    /// Whether the train loss moved less than the tolerance over the window.
    fn plateaued(&self, history: &JobHistory) -> bool {
        let window = self.config.plateau_window.max(1);
        let losses = history.train_loss();

        if losses.len() <= window {
            return false;
        }

        let old = losses[losses.len() - 1 - window];
        let new = losses[losses.len() - 1];

        if old == 0. {
            return new == 0.;
        }

        ((old - new) / old).abs() < self.config.plateau_tolerance
    }

    /// -1, 0 or 1, the step that follows up on the last parallelism change.
    ///
    /// Compares the mean epoch duration at the current parallelism with the one at
    /// the parallelism before it. A change that made epochs faster is continued in
    /// the same direction, one that made them slower is undone.
    fn trend(&self, history: &JobHistory) -> i64 {
        let parallelism = history.parallelism();
        let durations = history.epoch_duration();

        let Some(current) = run_before(parallelism, parallelism.len()) else {
            return 0;
        };
        let Some(previous) = run_before(parallelism, current.start) else {
            return 0;
        };

        let before = mean(&durations[previous.clone()]);
        let after = mean(&durations[current.clone()]);

        if before <= 0. {
            return 0;
        }

        let direction = if parallelism[current.start] > parallelism[previous.start] {
            1
        } else {
            -1
        };

        let change = (after - before) / before;
        let threshold = self.config.speedup_threshold;

        if change <= -threshold {
            direction
        } else if change >= threshold {
            -direction
        } else {
            0
        }
    }
}

/// The indices of the run of equal values that ends right before `end`.
fn run_before(values: &[f64], end: usize) -> Option<Range<usize>> {
    let last = *values.get(end.checked_sub(1)?)?;
    let start = values[..end]
        .iter()
        .rposition(|&v| v != last)
        .map_or(0, |i| i + 1);

    Some(start..end)
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

impl SchedulingPolicy for ThroughputPolicy {
    fn initial(&self, request: &TrainRequest, cluster: &ClusterState) -> usize {
        let wanted = request.options.default_parallelism.max(1);
        wanted.min(self.limit("", cluster))
    }

    fn decide(
        &self,
        job_id: &str,
        state: &JobState,
        history: &JobHistory,
        cluster: &ClusterState,
    ) -> ScheduleResponse {
        let current = state.parallelism.max(1) as i64;

        let delta = if cluster.decisions(job_id) == 0 {
            1
        } else if self.plateaued(history) {
            -1
        } else {
            self.trend(history)
        };

        // A running job always keeps at least one worker.
        let limit = self.limit(job_id, cluster).max(1) as i64;
        let parallelism = (current + delta).clamp(1, limit) as usize;

        ScheduleResponse { parallelism }
    }
}

#[cfg(test)]
mod tests {
    use comms::specs::MetricUpdate;

    use super::*;

    fn policy() -> ThroughputPolicy {
        ThroughputPolicy::new(PolicyConfig::default(), 8)
    }

    /// A history out of `(train_loss, epoch_duration, parallelism)` samples.
    fn history(samples: &[(f64, f64, usize)]) -> JobHistory {
        let mut history = JobHistory::default();

        for &(train_loss, epoch_duration, parallelism) in samples {
            history.push(MetricUpdate {
                train_loss,
                epoch_duration,
                parallelism: parallelism as f64,
                ..Default::default()
            });
        }

        history
    }

    fn state(parallelism: usize) -> JobState {
        JobState {
            parallelism,
            elapsed_time: 10.,
        }
    }

    /// A cluster where `job` already had one decision.
    fn cluster(capacity: usize, parallelism: usize) -> ClusterState {
        let mut cluster = ClusterState::new(capacity);
        cluster.insert("job", parallelism);
        cluster.record("job", parallelism);
        cluster
    }

    #[test]
    fn test_first_decision_explores() {
        let mut cluster = ClusterState::new(64);
        cluster.insert("job", 2);

        let resp = policy().decide("job", &state(2), &history(&[(1., 10., 2)]), &cluster);
        assert_eq!(resp.parallelism, 3);
    }

    #[test]
    fn test_follows_up_on_an_increase() {
        let policy = policy();
        let cluster = cluster(64, 3);

        let faster = history(&[(1., 10., 2), (0.8, 8., 3)]);
        assert_eq!(policy.decide("job", &state(3), &faster, &cluster).parallelism, 4);

        let slower = history(&[(1., 10., 2), (0.8, 12., 3)]);
        assert_eq!(policy.decide("job", &state(3), &slower, &cluster).parallelism, 2);

        let same = history(&[(1., 10., 2), (0.8, 10.2, 3)]);
        assert_eq!(policy.decide("job", &state(3), &same, &cluster).parallelism, 3);
    }

    #[test]
    fn test_follows_up_on_a_decrease() {
        let policy = policy();
        let cluster = cluster(64, 2);

        let faster = history(&[(1., 10., 3), (0.8, 8., 2)]);
        assert_eq!(policy.decide("job", &state(2), &faster, &cluster).parallelism, 1);

        let slower = history(&[(1., 10., 3), (0.8, 12., 2)]);
        assert_eq!(policy.decide("job", &state(2), &slower, &cluster).parallelism, 3);
    }

    #[test]
    fn test_compares_whole_runs_of_epochs() {
        let policy = policy();
        let cluster = cluster(64, 3);

        let noisy = history(&[(1., 10., 2), (0.9, 10.2, 2), (0.8, 12., 3), (0.7, 9., 3)]);
        assert_eq!(policy.decide("job", &state(3), &noisy, &cluster).parallelism, 3);

        let faster = history(&[(1., 10., 2), (0.9, 10., 2), (0.8, 8., 3), (0.7, 8.4, 3)]);
        assert_eq!(policy.decide("job", &state(3), &faster, &cluster).parallelism, 4);

        let unchanged = history(&[(1., 10., 3), (0.8, 6., 3)]);
        assert_eq!(policy.decide("job", &state(3), &unchanged, &cluster).parallelism, 3);
    }

    #[test]
    fn test_plateau_shrinks() {
        let flat = history(&[(0.5, 10., 2), (0.5, 9., 2), (0.499, 8., 3), (0.499, 7., 3)]);
        let resp = policy().decide("job", &state(3), &flat, &cluster(64, 3));

        assert_eq!(resp.parallelism, 2);
    }

    #[test]
    fn test_clamped_to_capacity_and_one() {
        let policy = policy();
        let faster = history(&[(1., 10., 2), (0.8, 5., 3)]);

        let mut busy = cluster(6, 3);
        busy.insert("other", 3);
        busy.record("other", 3);
        assert_eq!(policy.decide("job", &state(3), &faster, &busy).parallelism, 3);

        let at_max = cluster(64, 8);
        assert_eq!(policy.decide("job", &state(8), &faster, &at_max).parallelism, 8);

        let shrinking = history(&[(1., 10., 2), (0.8, 5., 1)]);
        assert_eq!(policy.decide("job", &state(1), &shrinking, &cluster(64, 1)).parallelism, 1);
    }

    #[test]
    fn test_overcommitted_job_is_shrunk_to_one() {
        let mut full = cluster(3, 3);
        full.insert("other", 3);
        full.record("other", 3);

        let same = history(&[(1., 10., 2), (0.8, 10., 3)]);
        assert_eq!(policy().decide("job", &state(3), &same, &full).parallelism, 1);
    }

    #[test]
    fn test_decisions_are_deterministic() {
        let policy = policy();
        let history = history(&[(1., 10., 2), (0.9, 9., 3), (0.85, 9.5, 3), (0.8, 11., 4)]);
        let cluster = cluster(16, 4);

        let first = policy.decide("job", &state(4), &history, &cluster);
        for _ in 0..10 {
            assert_eq!(policy.decide("job", &state(4), &history, &cluster), first);
        }
    }

    #[test]
    fn test_initial_parallelism_fits_the_cluster() {
        let request: TrainRequest = serde_json::from_str(
            r#"{"model_type":"m","batch_size":1,"epochs":1,"dataset":"d","lr":0.1,"function_name":"f","options":{"default_parallelism":6}}"#,
        )
        .unwrap();

        assert_eq!(policy().initial(&request, &ClusterState::new(64)), 6);
        assert_eq!(policy().initial(&request, &cluster(5, 3)), 2);
        assert_eq!(policy().initial(&request, &cluster(3, 3)), 0);
    }
}
