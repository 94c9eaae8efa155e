//! Whole-store export and import.
//!
//! A backup is a flat list of `(kind, id, doc)` entries serialized as JSON.
//! Import wipes every kind first, then recreates the objects in page-sized
//! batches.

use crate::model::record::ObjectKind;
use crate::reconcile::bulk::{abort, log_done, BulkReconciler, PageScan};
use crate::reconcile::{ReconcileError, ReconcileReport};
use crate::repo::datastore::{Datastore, Document, Filter};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const BACKUP_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupObject {
    pub kind: ObjectKind,
    pub id: String,
    pub doc: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Backup {
    pub format_version: u32,
    pub exported_at: i64,
    pub objects: Vec<BackupObject>,
}

impl Backup {
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// Reads every object of every kind.
pub fn export_all<S: Datastore>(
    bulk: &BulkReconciler<'_, S>,
    now_millis: i64,
) -> Result<Backup, ReconcileError> {
    const JOB: &str = "export";
    let mut report = ReconcileReport::new(JOB);
    let mut objects = Vec::new();
    for kind in ObjectKind::ALL {
        for page in PageScan::new(bulk.store(), kind, Filter::All, bulk.page_size()) {
            let page = page.map_err(|source| abort(JOB, report.pages, source))?;
            report.pages += 1;
            report.scanned += page.len() as u64;
            objects.extend(page.into_iter().map(|doc| BackupObject {
                kind: doc.kind,
                id: doc.id,
                doc: doc.body,
            }));
        }
    }
    log_done(&report);
    Ok(Backup {
        format_version: BACKUP_FORMAT_VERSION,
        exported_at: now_millis,
        objects,
    })
}

/// Replaces the store's contents with `backup`.
pub fn import_all<S: Datastore>(
    bulk: &BulkReconciler<'_, S>,
    backup: &Backup,
) -> Result<ReconcileReport, ReconcileError> {
    const JOB: &str = "import";
    if backup.format_version != BACKUP_FORMAT_VERSION {
        return Err(ReconcileError::UnsupportedBackup(backup.format_version));
    }

    let mut report = ReconcileReport::new(JOB);
    for kind in ObjectKind::ALL {
        report.absorb(&bulk.delete_kind(JOB, kind)?);
    }

    let batch = bulk.page_size().max(1) as usize;
    for chunk in backup.objects.chunks(batch) {
        let docs: Vec<Document> = chunk
            .iter()
            .map(|object| Document {
                kind: object.kind,
                id: object.id.clone(),
                body: object.doc.clone(),
            })
            .collect();
        bulk.store()
            .create_documents(&docs)
            .map_err(|source| abort(JOB, report.pages, source))?;
        report.created += docs.len() as u64;
    }
    log_done(&report);
    Ok(report)
}
