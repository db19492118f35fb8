use std::{
    collections::{HashMap, VecDeque},
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::{
    cluster::{Cluster, PodPhase, PodRef},
    error::{LifecycleErr, Result},
    spec::PodTemplate,
};

/// How a simulated pod evolves after its creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodBehavior {
    /// Pending until `after` elapsed, then running.
    Ready { after: Duration },
    /// Pending until `after` elapsed, then failed.
    Fail { after: Duration },
    /// Pending forever.
    Hang,
}

struct LocalPod {
    template: PodTemplate,
    created: Instant,
    behavior: PodBehavior,
}

impl LocalPod {
    fn phase(&self) -> PodPhase {
        let elapsed = self.created.elapsed();

        match self.behavior {
            PodBehavior::Ready { after } if elapsed >= after => PodPhase::Running,
            PodBehavior::Fail { after } if elapsed >= after => PodPhase::Failed,
            _ => PodPhase::Pending,
        }
    }
}

/// An in memory `Cluster`, every pod follows a scripted `PodBehavior`.
///
/// Behaviors pushed with `script` are consumed in creation order, once
/// exhausted pods fall back to the default behavior.
pub struct LocalCluster {
    pods: Mutex<HashMap<String, LocalPod>>,
    script: Mutex<VecDeque<PodBehavior>>,
    default: PodBehavior,
    created: AtomicUsize,
    deleted: AtomicUsize,
}

impl Default for LocalCluster {
    fn default() -> Self {
        Self::new(PodBehavior::Ready {
            after: Duration::ZERO,
        })
    }
}

impl LocalCluster {
    /// Creates a new `LocalCluster`.
    ///
    /// # Arguments
    /// * `default` - The behavior of pods created once the script is exhausted.
    pub fn new(default: PodBehavior) -> Self {
        Self {
            pods: Mutex::new(HashMap::new()),
            script: Mutex::new(VecDeque::new()),
            default,
            created: AtomicUsize::new(0),
            deleted: AtomicUsize::new(0),
        }
    }

    /// Queues the behavior of the next created pod.
    pub fn script(&self, behavior: PodBehavior) {
        self.script.lock().push_back(behavior);
    }

    /// The amount of pods ever created.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Acquire)
    }

    /// The amount of pods ever deleted.
    pub fn deleted(&self) -> usize {
        self.deleted.load(Ordering::Acquire)
    }

    /// The names of the pods still alive.
    pub fn live_pods(&self) -> Vec<String> {
        let mut names: Vec<_> = self.pods.lock().keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl Cluster for LocalCluster {
    async fn create_pod(&self, template: &PodTemplate) -> Result<PodRef> {
        let mut pods = self.pods.lock();

        if pods.contains_key(&template.name) {
            return Err(LifecycleErr::AlreadyExists(template.name.clone()));
        }

        let behavior = self.script.lock().pop_front().unwrap_or(self.default);
        let pod = LocalPod {
            template: template.clone(),
            created: Instant::now(),
            behavior,
        };

        pods.insert(template.name.clone(), pod);
        self.created.fetch_add(1, Ordering::AcqRel);

        Ok(PodRef {
            name: template.name.clone(),
            addr: None,
        })
    }

    async fn pod_phase(&self, name: &str) -> Result<PodPhase> {
        self.pods
            .lock()
            .get(name)
            .map(LocalPod::phase)
            .ok_or_else(|| LifecycleErr::NotFound(name.to_string()))
    }

    async fn delete_pod(&self, name: &str) -> Result<()> {
        self.pods
            .lock()
            .remove(name)
            .ok_or_else(|| LifecycleErr::NotFound(name.to_string()))?;

        self.deleted.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    async fn list_pods(&self, selector: &[(&str, &str)]) -> Result<Vec<String>> {
        let mut names: Vec<_> = self
            .pods
            .lock()
            .values()
            .filter(|pod| pod.template.matches(selector))
            .map(|pod| pod.template.name.clone())
            .collect();

        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::WorkerSpec;

    #[tokio::test(start_paused = true)]
    async fn test_scripted_phases() {
        let cluster = LocalCluster::new(PodBehavior::Hang);
        let after = Duration::from_secs(2);
        cluster.script(PodBehavior::Ready { after });
        cluster.script(PodBehavior::Fail { after });

        let spec = WorkerSpec::default();
        let ready = cluster.create_pod(&spec.template("job", 0)).await.unwrap();
        let failed = cluster.create_pod(&spec.template("job", 1)).await.unwrap();
        let hung = cluster.create_pod(&spec.template("job", 2)).await.unwrap();

        assert_eq!(cluster.pod_phase(&ready.name).await.unwrap(), PodPhase::Pending);
        tokio::time::advance(after).await;

        assert_eq!(cluster.pod_phase(&ready.name).await.unwrap(), PodPhase::Running);
        assert_eq!(cluster.pod_phase(&failed.name).await.unwrap(), PodPhase::Failed);
        assert_eq!(cluster.pod_phase(&hung.name).await.unwrap(), PodPhase::Pending);
        assert_eq!(cluster.created(), 3);
    }

    #[tokio::test]
    async fn test_duplicate_and_missing_pods() {
        let cluster = LocalCluster::default();
        let template = WorkerSpec::default().template("job", 0);

        cluster.create_pod(&template).await.unwrap();
        assert!(matches!(
            cluster.create_pod(&template).await,
            Err(LifecycleErr::AlreadyExists(_))
        ));

        cluster.delete_pod(&template.name).await.unwrap();
        assert!(matches!(
            cluster.delete_pod(&template.name).await,
            Err(LifecycleErr::NotFound(_))
        ));
        assert!(matches!(
            cluster.pod_phase(&template.name).await,
            Err(LifecycleErr::NotFound(_))
        ));
    }
}
