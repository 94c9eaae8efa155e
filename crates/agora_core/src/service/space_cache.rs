//! Time-bounded cache of the space list.
//!
//! Read-heavy request paths validate space references against this cache
//! instead of scanning space records on every call. Entries refresh lazily
//! once older than the TTL; `invalidate` forces the next read to reload.

use crate::clock::Clock;
use crate::model::space::{Space, DEFAULT_SPACE};
use crate::repo::datastore::{Datastore, Filter};
use crate::repo::pager::Pager;
use crate::repo::RepoResult;
use chrono::{DateTime, Duration, Utc};
use log::debug;
use std::sync::{Arc, PoisonError, RwLock};

const SPACE_PAGE_SIZE: u32 = 100;

struct CachedSpaces {
    loaded_at: DateTime<Utc>,
    spaces: Arc<Vec<Space>>,
}

pub struct SpaceCache {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    state: RwLock<Option<CachedSpaces>>,
}

impl SpaceCache {
    pub fn new(ttl_sec: i64, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl: Duration::seconds(ttl_sec.max(0)),
            clock,
            state: RwLock::new(None),
        }
    }

    /// Returns the cached spaces, reloading them when stale.
    pub fn spaces<S: Datastore>(&self, store: &S) -> RepoResult<Arc<Vec<Space>>> {
        let now = self.clock.now();
        {
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(cached) = state.as_ref() {
                if now - cached.loaded_at < self.ttl {
                    return Ok(Arc::clone(&cached.spaces));
                }
            }
        }

        let spaces = Arc::new(load_spaces(store)?);
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *state = Some(CachedSpaces {
            loaded_at: now,
            spaces: Arc::clone(&spaces),
        });
        debug!(
            "event=space_cache_refresh module=space_cache status=ok spaces={}",
            spaces.len()
        );
        Ok(spaces)
    }

    /// Whether `reference` (`id:name` or bare id) names a known space.
    ///
    /// The default space always exists.
    pub fn contains<S: Datastore>(&self, store: &S, reference: &str) -> RepoResult<bool> {
        let id = Space::id_from_reference(reference);
        if id == DEFAULT_SPACE {
            return Ok(true);
        }
        Ok(self.spaces(store)?.iter().any(|space| space.id == id))
    }

    /// Canonical `id:name` reference for a known space.
    pub fn resolve<S: Datastore>(&self, store: &S, reference: &str) -> RepoResult<Option<String>> {
        let id = Space::id_from_reference(reference);
        if id == DEFAULT_SPACE {
            return Ok(Some(DEFAULT_SPACE.to_string()));
        }
        Ok(self
            .spaces(store)?
            .iter()
            .find(|space| space.id == id)
            .map(Space::reference))
    }

    pub fn invalidate(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *state = None;
    }
}

fn load_spaces<S: Datastore>(store: &S) -> RepoResult<Vec<Space>> {
    let mut pager = Pager::new(SPACE_PAGE_SIZE);
    let mut spaces = Vec::new();
    loop {
        let page: Vec<Space> = store.find_query(&Filter::All, &mut pager)?;
        if page.is_empty() {
            return Ok(spaces);
        }
        spaces.extend(page);
    }
}
