//! Paged scans and the page-wise patch/delete drivers.

use crate::model::record::{ObjectKind, Record};
use crate::reconcile::{ReconcileError, ReconcileReport};
use crate::repo::datastore::{Datastore, Document, Filter, Patch};
use crate::repo::pager::Pager;
use crate::repo::{RepoError, RepoResult};
use log::{error, info};

/// Iterator over pages of documents matching a filter.
///
/// Continues by id so objects patched or deleted on earlier pages do not
/// shift later ones. Stops after the first empty page or error.
pub struct PageScan<'s, S: Datastore> {
    store: &'s S,
    kind: ObjectKind,
    filter: Filter,
    pager: Pager,
    finished: bool,
}

impl<'s, S: Datastore> PageScan<'s, S> {
    pub fn new(store: &'s S, kind: ObjectKind, filter: Filter, page_size: u32) -> Self {
        Self {
            store,
            kind,
            filter,
            pager: Pager::new(page_size),
            finished: false,
        }
    }

    /// Decodes each page into `T`.
    pub fn records<T: Record>(self) -> impl Iterator<Item = RepoResult<Vec<T>>> + 's
    where
        S: 's,
    {
        self.map(|page| page?.iter().map(Document::decode).collect())
    }

    pub fn pages_fetched(&self) -> u64 {
        self.pager.page
    }
}

impl<S: Datastore> Iterator for PageScan<'_, S> {
    type Item = RepoResult<Vec<Document>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self
            .store
            .find_documents(self.kind, &self.filter, &mut self.pager)
        {
            Ok(page) if page.is_empty() => {
                self.finished = true;
                None
            }
            Ok(page) => Some(Ok(page)),
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}

/// Runs page-wise bulk jobs against one store.
pub struct BulkReconciler<'s, S: Datastore> {
    store: &'s S,
    page_size: u32,
}

impl<'s, S: Datastore> BulkReconciler<'s, S> {
    pub fn new(store: &'s S, page_size: u32) -> Self {
        Self { store, page_size }
    }

    pub fn store(&self) -> &'s S {
        self.store
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Scans every `T` matching `filter` and commits the patches returned by
    /// `transform` one page at a time.
    pub fn patch_each<T, F>(
        &self,
        job: &str,
        filter: &Filter,
        mut transform: F,
    ) -> Result<ReconcileReport, ReconcileError>
    where
        T: Record,
        F: FnMut(&T) -> Option<Patch>,
    {
        let mut report = ReconcileReport::new(job);
        let result = self
            .store
            .update_all_partially(T::KIND, self.page_size, |to_patch, pager| {
                let page: Vec<T> = self.store.find_query(filter, pager)?;
                if !page.is_empty() {
                    report.pages += 1;
                    report.scanned += page.len() as u64;
                }
                to_patch.extend(
                    page.iter()
                        .filter_map(&mut transform)
                        .filter(|patch| !patch.is_empty()),
                );
                Ok(page.len())
            });
        match result {
            Ok(patched) => {
                report.patched = patched as u64;
                log_done(&report);
                Ok(report)
            }
            Err(source) => Err(abort(job, report.pages, source)),
        }
    }

    /// Deletes every `T` matching `filter` for which `select` holds, one page
    /// per batch.
    pub fn delete_each<T, F>(
        &self,
        job: &str,
        filter: &Filter,
        mut select: F,
    ) -> Result<ReconcileReport, ReconcileError>
    where
        T: Record,
        F: FnMut(&T) -> bool,
    {
        let mut report = ReconcileReport::new(job);
        for page in PageScan::new(self.store, T::KIND, filter.clone(), self.page_size) {
            let page = page
                .and_then(|docs| docs.iter().map(Document::decode).collect::<RepoResult<Vec<T>>>())
                .map_err(|source| abort(job, report.pages, source))?;
            report.pages += 1;
            report.scanned += page.len() as u64;
            let ids: Vec<String> = page
                .iter()
                .filter(|record| select(record))
                .map(|record| record.id().to_string())
                .collect();
            if ids.is_empty() {
                continue;
            }
            report.deleted += self
                .store
                .delete_all(T::KIND, &ids)
                .map_err(|source| abort(job, report.pages, source))? as u64;
        }
        log_done(&report);
        Ok(report)
    }

    /// Deletes every object of `kind` regardless of shape.
    pub fn delete_kind(&self, job: &str, kind: ObjectKind) -> Result<ReconcileReport, ReconcileError> {
        let mut report = ReconcileReport::new(job);
        for page in PageScan::new(self.store, kind, Filter::All, self.page_size) {
            let page = page.map_err(|source| abort(job, report.pages, source))?;
            report.pages += 1;
            report.scanned += page.len() as u64;
            let ids: Vec<String> = page.into_iter().map(|doc| doc.id).collect();
            report.deleted += self
                .store
                .delete_all(kind, &ids)
                .map_err(|source| abort(job, report.pages, source))? as u64;
        }
        log_done(&report);
        Ok(report)
    }
}

pub(crate) fn abort(job: &str, pages: u64, source: RepoError) -> ReconcileError {
    error!(
        "event=reconcile_job module=reconcile status=error job={} pages={} error={}",
        job, pages, source
    );
    ReconcileError::Aborted {
        job: job.to_string(),
        pages,
        source,
    }
}

pub(crate) fn log_done(report: &ReconcileReport) {
    info!(
        "event=reconcile_job module=reconcile status=ok job={} pages={} scanned={} patched={} created={} deleted={}",
        report.job, report.pages, report.scanned, report.patched, report.created, report.deleted
    );
}
