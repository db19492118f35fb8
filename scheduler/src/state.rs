use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct JobEntry {
    parallelism: usize,
    decisions: usize,
}

/// The scheduler's view of the cluster: every active job and the workers it was granted.
///
/// Starts empty, jobs are inserted when submitted (or on their first request)
/// and removed once they reach a terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterState {
    capacity: usize,
    jobs: HashMap<String, JobEntry>,
}

impl ClusterState {
    /// Creates a new, empty `ClusterState`.
    ///
    /// # Arguments
    /// * `capacity` - The amount of workers the cluster can run at once.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            jobs: HashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Registers a job, replacing any previous entry with the same id.
    pub fn insert(&mut self, job_id: &str, parallelism: usize) {
        let entry = JobEntry {
            parallelism,
            decisions: 0,
        };

        self.jobs.insert(job_id.to_string(), entry);
    }

    /// Records a decision taken for a job.
    pub fn record(&mut self, job_id: &str, parallelism: usize) {
        if let Some(entry) = self.jobs.get_mut(job_id) {
            entry.parallelism = parallelism;
            entry.decisions += 1;
        }
    }

    /// Forgets a job, returns whether it was known.
    pub fn remove(&mut self, job_id: &str) -> bool {
        self.jobs.remove(job_id).is_some()
    }

    pub fn contains(&self, job_id: &str) -> bool {
        self.jobs.contains_key(job_id)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// The last parallelism granted to a job.
    pub fn parallelism(&self, job_id: &str) -> Option<usize> {
        self.jobs.get(job_id).map(|e| e.parallelism)
    }

    /// The amount of decisions taken for a job since it was registered.
    pub fn decisions(&self, job_id: &str) -> usize {
        self.jobs.get(job_id).map_or(0, |e| e.decisions)
    }

    /// The amount of workers granted across every job.
    pub fn in_use(&self) -> usize {
        self.jobs.values().map(|e| e.parallelism).sum()
    }

    /// The amount of workers a job could hold without going over capacity,
    /// counting the ones it already has.
    pub fn available_for(&self, job_id: &str) -> usize {
        let own = self.parallelism(job_id).unwrap_or(0);
        let others = self.in_use() - own;
        self.capacity.saturating_sub(others)
    }

    /// Sorted ids of the active jobs.
    pub fn job_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.jobs.keys().cloned().collect();
        ids.sort();
        ids
    }
}
