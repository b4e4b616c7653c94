use std::sync::Arc;
use std::time::Duration;

use latency_store::{ContainerRef, InMemoryStore, ReadFault, StoreOp};
use latency_workload::{ShutdownOutcome, Workload, WorkloadConfig, WorkloadError, WorkloadState};

fn container() -> ContainerRef {
    ContainerRef::new("latency", "docs")
}

fn config(concurrency: usize, docs: usize) -> WorkloadConfig {
    WorkloadConfig::new(container())
        .concurrency(concurrency)
        .doc_count(docs)
        .property_count(3)
        .grace_period(Duration::from_secs(5))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn seeding_completes_before_exactly_n_readers_start() {
    let store = Arc::new(InMemoryStore::new());
    let workload = Workload::new(config(4, 50), store.clone());

    workload.initialize().await.unwrap();
    assert_eq!(store.read_count(), 0);

    let pool = workload.start().unwrap();
    assert_eq!(pool.spawned(), 4);
    assert_eq!(workload.state(), WorkloadState::Running);

    tokio::time::sleep(Duration::from_millis(50)).await;
    let outcome = workload.shutdown(pool).await;

    assert_eq!(outcome, ShutdownOutcome::Graceful);
    assert_eq!(workload.state(), WorkloadState::Stopped);
    assert_eq!(workload.readers_started(), 4);
    assert_eq!(workload.readers_finished(), 4);

    // database + container + 50 documents, all before the first read
    assert_eq!(store.ops_before_first_read(), Some(52));
    assert!(store.read_count() > 0);

    let stats = workload.stats();
    assert_eq!(stats.total_reads, store.read_count());
    assert_eq!(stats.successes, stats.total_reads);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn seeded_documents_are_keyed_by_id() {
    let store = Arc::new(InMemoryStore::new());
    let workload = Workload::new(config(1, 5), store.clone());
    workload.initialize().await.unwrap();

    assert_eq!(store.item_count(), 5);
    for id in workload.corpus().ids() {
        let doc = store
            .item(&container(), id, id)
            .expect("document should be stored under its own partition key");
        let fields = doc.as_object().unwrap();
        assert_eq!(fields.len(), 4);
        assert_eq!(fields["id"], id.as_str());
        assert!(fields.contains_key("Property3"));
    }

    let ops = store.ops();
    assert_eq!(ops[0], StoreOp::CreateDatabase("latency".into()));
    assert_eq!(
        ops[1],
        StoreOp::CreateContainer {
            database_id: "latency".into(),
            spec_id: "docs".into()
        }
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stop_is_idempotent() {
    let store = Arc::new(InMemoryStore::new());
    let workload = Workload::new(config(2, 10), store);
    workload.initialize().await.unwrap();
    let pool = workload.start().unwrap();

    assert!(workload.stop());
    assert_eq!(workload.state(), WorkloadState::Stopping);
    assert!(!workload.stop());
    assert_eq!(workload.state(), WorkloadState::Stopping);

    assert_eq!(workload.shutdown(pool).await, ShutdownOutcome::Graceful);
    assert!(!workload.stop());
    assert_eq!(workload.state(), WorkloadState::Stopped);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn at_most_one_read_per_reader_after_stop() {
    let store = Arc::new(InMemoryStore::new().with_latency(Duration::from_millis(5)));
    let workload = Workload::new(config(3, 20), store.clone());
    workload.initialize().await.unwrap();
    let pool = workload.start().unwrap();

    tokio::time::sleep(Duration::from_millis(60)).await;
    workload.stop();
    let reads_at_stop = store.read_count();

    assert_eq!(workload.shutdown(pool).await, ShutdownOutcome::Graceful);
    assert!(
        store.read_count() <= reads_at_stop + 3,
        "{} reads after stop",
        store.read_count() - reads_at_stop
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn read_errors_do_not_end_readers() {
    let store = Arc::new(InMemoryStore::new());
    let workload = Workload::new(config(2, 10), store.clone());
    workload.initialize().await.unwrap();
    store.fail_all_reads(ReadFault::Error);

    let pool = workload.start().unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(workload.readers_finished(), 0);
    let during = workload.stats();
    assert!(during.errors > 0);
    assert_eq!(during.successes, 0);

    assert_eq!(workload.shutdown(pool).await, ShutdownOutcome::Graceful);
    assert_eq!(workload.readers_finished(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn non_success_statuses_are_counted_and_survived() {
    let store = Arc::new(InMemoryStore::new());
    let workload = Workload::new(config(2, 10), store.clone());
    workload.initialize().await.unwrap();
    store.fail_all_reads(ReadFault::Status(503));

    let pool = workload.start().unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(workload.readers_finished(), 0);

    workload.shutdown(pool).await;
    let stats = workload.stats();
    assert!(stats.failures > 0);
    assert_eq!(stats.statuses.get(&503), Some(&stats.failures));
}

#[tokio::test]
async fn seeding_failure_aborts_initialization() {
    let store = Arc::new(InMemoryStore::new().with_write_limit(5));
    let workload = Workload::new(config(2, 10), store.clone());

    let err = workload.initialize().await.unwrap_err();
    match err {
        WorkloadError::Seed { index, ref id, .. } => {
            assert_eq!(index, 5);
            assert_eq!(id, &workload.corpus().ids()[5]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(workload.state(), WorkloadState::Stopped);
    assert!(workload.start().is_err());
    assert_eq!(store.read_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn slow_readers_are_abandoned_after_grace_period() {
    // Every call takes 300ms, far past the 100ms grace period.
    let store = Arc::new(InMemoryStore::new().with_latency(Duration::from_millis(300)));
    let workload = Workload::new(
        config(2, 1).grace_period(Duration::from_millis(100)),
        store,
    );
    workload.initialize().await.unwrap();

    let pool = workload.start().unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    let outcome = workload.shutdown(pool).await;

    assert_eq!(outcome, ShutdownOutcome::TimedOut { abandoned: 2 });
    assert_eq!(workload.state(), WorkloadState::Stopped);
    assert_eq!(workload.readers_finished(), 0);
}
