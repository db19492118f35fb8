use std::{sync::Arc, time::Duration};

use worker::{
    Cluster, LocalCluster, PodBehavior, Readiness, WorkerLifecycleManager, WorkerSpec,
};

const POLL: Duration = Duration::from_secs(1);
const TIMEOUT: Duration = Duration::from_secs(20);

fn manager(cluster: &Arc<LocalCluster>) -> WorkerLifecycleManager {
    WorkerLifecycleManager::new(Arc::clone(cluster) as Arc<dyn Cluster>, POLL)
}

#[tokio::test(start_paused = true)]
async fn ready_worker_is_reported_ready() {
    let cluster = Arc::new(LocalCluster::default());
    cluster.script(PodBehavior::Ready {
        after: Duration::from_secs(3),
    });

    let manager = manager(&cluster);
    let handle = manager
        .create_worker("ab12cd34", 0, &WorkerSpec::default())
        .await
        .unwrap();

    assert_eq!(handle.pod, "worker-ab12cd34-0");
    assert_eq!(manager.await_ready(&handle, TIMEOUT).await, Readiness::Ready);
}

#[tokio::test(start_paused = true)]
async fn never_running_worker_times_out_instead_of_failing() {
    let cluster = Arc::new(LocalCluster::new(PodBehavior::Hang));
    let manager = manager(&cluster);

    let handle = manager
        .create_worker("ab12cd34", 0, &WorkerSpec::default())
        .await
        .unwrap();

    assert_eq!(
        manager.await_ready(&handle, TIMEOUT).await,
        Readiness::TimedOut
    );

    // the timed out worker is leaked until someone destroys it
    assert_eq!(cluster.live_pods(), vec!["worker-ab12cd34-0".to_string()]);
    manager.destroy_worker(&handle).await.unwrap();
    assert!(cluster.live_pods().is_empty());
}

#[tokio::test(start_paused = true)]
async fn terminal_phase_before_running_is_a_failure() {
    let cluster = Arc::new(LocalCluster::new(PodBehavior::Fail {
        after: Duration::from_secs(2),
    }));
    let manager = manager(&cluster);

    let handle = manager
        .create_worker("ab12cd34", 1, &WorkerSpec::default())
        .await
        .unwrap();

    let readiness = manager.await_ready(&handle, TIMEOUT).await;
    assert!(matches!(readiness, Readiness::Failed(_)), "got {readiness:?}");
}

#[tokio::test(start_paused = true)]
async fn destroying_a_job_only_reclaims_its_pods() {
    let cluster = Arc::new(LocalCluster::default());
    let manager = manager(&cluster);
    let spec = WorkerSpec::default();

    for id in 0..3 {
        manager.create_worker("job-a", id, &spec).await.unwrap();
    }
    let other = manager.create_worker("job-b", 0, &spec).await.unwrap();

    assert_eq!(manager.destroy_job("job-a").await.unwrap(), 3);
    assert_eq!(cluster.live_pods(), vec![other.pod.clone()]);

    // destroying twice is harmless
    assert_eq!(manager.destroy_job("job-a").await.unwrap(), 0);
    manager.destroy_worker(&other).await.unwrap();
    manager.destroy_worker(&other).await.unwrap();
    assert_eq!(cluster.deleted(), 4);
}
