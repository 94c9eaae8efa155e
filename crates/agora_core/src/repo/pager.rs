//! Query cursor shared by paginated reads and bulk scans.

/// Upper bound on rows returned by one page.
pub const PAGE_LIMIT_MAX: u32 = 1000;
pub const PAGE_LIMIT_DEFAULT: u32 = 30;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    /// Stable order usable with `last_key` continuation.
    #[default]
    Id,
    CreatedAt,
    UpdatedAt,
}

/// Cursor for one paginated query.
///
/// `page` counts pages fetched so far. With [`SortKey::Id`] the next page
/// continues after `last_key`, which keeps scans correct while earlier pages
/// are being patched. Other sort keys fall back to offset paging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pager {
    pub page: u64,
    pub limit: u32,
    pub sort_by: SortKey,
    pub desc: bool,
    pub last_key: Option<String>,
    /// Total matches reported by the most recent fetch.
    pub count: u64,
}

impl Default for Pager {
    fn default() -> Self {
        Self::new(PAGE_LIMIT_DEFAULT)
    }
}

impl Pager {
    pub fn new(limit: u32) -> Self {
        Self {
            page: 0,
            limit: normalize_page_limit(limit),
            sort_by: SortKey::Id,
            desc: false,
            last_key: None,
            count: 0,
        }
    }

    pub fn sorted_by(mut self, sort_by: SortKey, desc: bool) -> Self {
        self.sort_by = sort_by;
        self.desc = desc;
        self
    }

    /// Whether the next fetch continues from `last_key` instead of an offset.
    pub fn uses_keyset(&self) -> bool {
        self.sort_by == SortKey::Id
    }

    pub fn offset(&self) -> u64 {
        self.page.saturating_mul(u64::from(self.limit))
    }

    /// Records one fetched page.
    pub fn advance(&mut self, last_id: Option<&str>, total: u64) {
        self.page += 1;
        self.count = total;
        if let Some(id) = last_id {
            self.last_key = Some(id.to_string());
        }
    }
}

/// Clamps a page size into `1..=PAGE_LIMIT_MAX`.
pub fn normalize_page_limit(limit: u32) -> u32 {
    match limit {
        0 => PAGE_LIMIT_DEFAULT,
        value if value > PAGE_LIMIT_MAX => PAGE_LIMIT_MAX,
        value => value,
    }
}

#[cfg(test)]
mod tests {
    use super::{normalize_page_limit, Pager, SortKey, PAGE_LIMIT_DEFAULT, PAGE_LIMIT_MAX};

    #[test]
    fn limit_defaults_and_caps() {
        assert_eq!(normalize_page_limit(0), PAGE_LIMIT_DEFAULT);
        assert_eq!(normalize_page_limit(5_000), PAGE_LIMIT_MAX);
        assert_eq!(normalize_page_limit(7), 7);
    }

    #[test]
    fn advance_tracks_page_offset_and_continuation() {
        let mut pager = Pager::new(10).sorted_by(SortKey::UpdatedAt, true);
        assert!(!pager.uses_keyset());
        pager.advance(Some("b"), 25);
        assert_eq!(pager.offset(), 10);
        assert_eq!(pager.last_key.as_deref(), Some("b"));
        pager.advance(None, 25);
        assert_eq!(pager.page, 2);
        assert_eq!(pager.last_key.as_deref(), Some("b"));
    }
}
