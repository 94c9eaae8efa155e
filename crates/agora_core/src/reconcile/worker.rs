//! Background reconciliation worker pool.
//!
//! Jobs are sent over a crossbeam channel to a fixed set of named threads.
//! Each enqueue returns a [`JobTicket`] the caller may wait on or drop.

use crate::config::{JobConfig, TagPolicy};
use crate::model::record::ObjectKind;
use crate::reconcile::backup::{import_all, Backup};
use crate::reconcile::bulk::BulkReconciler;
use crate::reconcile::jobs::{self, UserSelection};
use crate::reconcile::{ReconcileError, ReconcileReport};
use crate::repo::datastore::Datastore;
use crossbeam::channel::{self, Receiver, Sender};
use log::{info, warn};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;

pub type JobResult = Result<ReconcileReport, ReconcileError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("failed to spawn reconcile worker: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("reconcile workers are stopped")]
    Stopped,
    #[error("reconcile worker exited before reporting a result")]
    Disconnected,
    #[error("timed out waiting for reconcile job")]
    Timeout,
    #[error(transparent)]
    Job(#[from] ReconcileError),
}

#[derive(Debug, Clone)]
pub enum ReconcileJob {
    RenameTag { from: String, to: String },
    DeleteTag { tag: String },
    RecountTags,
    RenameSpace { space_id: String, new_name: String },
    DeleteSpace { space_id: String },
    AssignSpaces { selection: UserSelection, spaces: Vec<String> },
    SetCustomBadge { selection: UserSelection, marker: String, grant: bool },
    MergeQuestions { source_id: String, target_id: String },
    DeleteAll { kind: ObjectKind },
    Import { backup: Box<Backup> },
}

impl ReconcileJob {
    pub fn name(&self) -> &'static str {
        match self {
            Self::RenameTag { .. } => "rename_tag",
            Self::DeleteTag { .. } => "delete_tag",
            Self::RecountTags => "recount_tags",
            Self::RenameSpace { .. } => "rename_space",
            Self::DeleteSpace { .. } => "delete_space",
            Self::AssignSpaces { .. } => "assign_spaces",
            Self::SetCustomBadge { .. } => "set_custom_badge",
            Self::MergeQuestions { .. } => "merge_questions",
            Self::DeleteAll { .. } => "delete_all",
            Self::Import { .. } => "import",
        }
    }

    /// Runs the job synchronously on the calling thread.
    pub fn run<S: Datastore>(&self, bulk: &BulkReconciler<'_, S>, policy: TagPolicy) -> JobResult {
        match self {
            Self::RenameTag { from, to } => jobs::rename_tag(bulk, from, to),
            Self::DeleteTag { tag } => jobs::delete_tag(bulk, tag),
            Self::RecountTags => jobs::recount_tags(bulk),
            Self::RenameSpace { space_id, new_name } => jobs::rename_space(bulk, space_id, new_name),
            Self::DeleteSpace { space_id } => jobs::delete_space(bulk, space_id),
            Self::AssignSpaces { selection, spaces } => jobs::assign_spaces(bulk, selection, spaces),
            Self::SetCustomBadge {
                selection,
                marker,
                grant,
            } => jobs::set_custom_badge(bulk, selection, marker, *grant),
            Self::MergeQuestions {
                source_id,
                target_id,
            } => jobs::merge_questions(bulk, policy, source_id, target_id),
            Self::DeleteAll { kind } => jobs::delete_all_of_kind(bulk, *kind),
            Self::Import { backup } => import_all(bulk, backup),
        }
    }
}

/// Handle to one enqueued job's eventual result.
pub struct JobTicket {
    job: &'static str,
    rx: Receiver<JobResult>,
}

impl JobTicket {
    pub fn job(&self) -> &'static str {
        self.job
    }

    /// Blocks until the job finishes.
    pub fn wait(self) -> Result<ReconcileReport, WorkerError> {
        let result = self.rx.recv().map_err(|_| WorkerError::Disconnected)?;
        Ok(result?)
    }

    pub fn wait_timeout(self, timeout: Duration) -> Result<ReconcileReport, WorkerError> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => Ok(result?),
            Err(channel::RecvTimeoutError::Timeout) => Err(WorkerError::Timeout),
            Err(channel::RecvTimeoutError::Disconnected) => Err(WorkerError::Disconnected),
        }
    }
}

enum WorkerCommand {
    Job {
        job: Box<ReconcileJob>,
        respond: Sender<JobResult>,
    },
    Shutdown,
}

pub struct ReconcileWorkerHandle {
    tx: Sender<WorkerCommand>,
    workers: Vec<JoinHandle<()>>,
}

impl ReconcileWorkerHandle {
    /// Spawns `config.workers` threads sharing `store`.
    pub fn start<S>(store: Arc<S>, config: JobConfig, policy: TagPolicy) -> Result<Self, WorkerError>
    where
        S: Datastore + 'static,
    {
        let (tx, rx) = channel::unbounded();
        let mut workers = Vec::with_capacity(config.workers);
        for index in 0..config.workers.max(1) {
            let store = Arc::clone(&store);
            let rx = rx.clone();
            let handle = thread::Builder::new()
                .name(format!("agora-reconcile-{index}"))
                .spawn(move || run_worker_loop(store.as_ref(), config.page_size, policy, rx))
                .map_err(WorkerError::Spawn)?;
            workers.push(handle);
        }
        info!(
            "event=reconcile_workers_start module=reconcile status=ok workers={}",
            workers.len()
        );
        Ok(Self { tx, workers })
    }

    pub fn enqueue(&self, job: ReconcileJob) -> Result<JobTicket, WorkerError> {
        let name = job.name();
        let (respond, rx) = channel::bounded(1);
        self.tx
            .send(WorkerCommand::Job {
                job: Box::new(job),
                respond,
            })
            .map_err(|_| WorkerError::Stopped)?;
        Ok(JobTicket { job: name, rx })
    }

    /// Lets queued jobs finish, then stops and joins every worker.
    pub fn shutdown(self) {
        for _ in &self.workers {
            let _ = self.tx.send(WorkerCommand::Shutdown);
        }
        for worker in self.workers {
            if worker.join().is_err() {
                warn!("event=reconcile_workers_stop module=reconcile status=error reason=panicked");
            }
        }
        info!("event=reconcile_workers_stop module=reconcile status=ok");
    }
}

fn run_worker_loop<S: Datastore>(
    store: &S,
    page_size: u32,
    policy: TagPolicy,
    rx: Receiver<WorkerCommand>,
) {
    let bulk = BulkReconciler::new(store, page_size);
    while let Ok(command) = rx.recv() {
        match command {
            WorkerCommand::Job { job, respond } => {
                let result = job.run(&bulk, policy);
                if let Err(err) = &result {
                    warn!(
                        "event=reconcile_job module=reconcile status=error job={} error={}",
                        job.name(),
                        err
                    );
                }
                // Ticket may have been dropped by a fire-and-forget caller.
                let _ = respond.send(result);
            }
            WorkerCommand::Shutdown => break,
        }
    }
}
