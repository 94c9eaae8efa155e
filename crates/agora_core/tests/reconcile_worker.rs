use agora_core::config::{JobConfig, TagPolicy};
use agora_core::{
    Datastore, Filter, ObjectKind, Post, ReconcileError, ReconcileJob, ReconcileWorkerHandle,
    SqliteDatastore, Tag, WorkerError,
};
use std::sync::Arc;
use std::time::Duration;

fn tagged(tags: &[&str]) -> Post {
    let mut post = Post::question("ann", "t", "b", 1_717_000_000_000);
    post.tags = tags.iter().map(|tag| tag.to_string()).collect();
    post
}

fn start(store: &Arc<SqliteDatastore>) -> ReconcileWorkerHandle {
    let config = JobConfig {
        workers: 2,
        page_size: 2,
    };
    ReconcileWorkerHandle::start(Arc::clone(store), config, TagPolicy::default()).unwrap()
}

#[test]
fn enqueued_job_runs_off_thread_and_reports() {
    let store = Arc::new(SqliteDatastore::open_in_memory().unwrap());
    let posts: Vec<Post> = (0..3).map(|_| tagged(&["old"])).collect();
    store.create_all(&posts).unwrap();
    let workers = start(&store);

    let ticket = workers
        .enqueue(ReconcileJob::RenameTag {
            from: "old".to_string(),
            to: "new".to_string(),
        })
        .unwrap();
    assert_eq!(ticket.job(), "rename_tag");
    let report = ticket.wait_timeout(Duration::from_secs(10)).unwrap();

    assert_eq!(report.patched, 3);
    assert_eq!(store.count(ObjectKind::Post, &Filter::tagged("new")).unwrap(), 3);
    workers.shutdown();
}

#[test]
fn failed_job_surfaces_through_ticket() {
    let store = Arc::new(SqliteDatastore::open_in_memory().unwrap());
    let workers = start(&store);

    let err = workers
        .enqueue(ReconcileJob::RenameSpace {
            space_id: "missing".to_string(),
            new_name: "x".to_string(),
        })
        .unwrap()
        .wait()
        .unwrap_err();

    assert!(matches!(
        err,
        WorkerError::Job(ReconcileError::MissingTarget { .. })
    ));
    workers.shutdown();
}

#[test]
fn shutdown_drains_fire_and_forget_jobs() {
    let store = Arc::new(SqliteDatastore::open_in_memory().unwrap());
    store.create(&tagged(&["rust"])).unwrap();
    store.create(&Tag::new("rust", 40)).unwrap();
    let workers = start(&store);

    drop(workers.enqueue(ReconcileJob::RecountTags).unwrap());
    workers.shutdown();

    assert_eq!(store.read::<Tag>("rust").unwrap().unwrap().count, 1);
}
