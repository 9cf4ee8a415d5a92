//! crates/matchmaking_core/src/pagination.rs
//!
//! The numbers behind the pagination control shown under browse results.

use serde::Serialize;

/// One visible entry in the pagination control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "page", rename_all = "snake_case")]
pub enum PageItem {
    Page(u32),
    Ellipsis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub total_pages: u32,
}

impl Pagination {
    /// Builds the control state, clamping `page` into `1..=total_pages`.
    /// An empty result set still has one (empty) page.
    pub fn new(page: u32, per_page: u32, total: u64) -> Self {
        let per_page = per_page.max(1);
        let pages = total.div_ceil(u64::from(per_page)).max(1);
        let total_pages = u32::try_from(pages).unwrap_or(u32::MAX);
        Self {
            page: page.clamp(1, total_pages),
            per_page,
            total,
            total_pages,
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.per_page)
    }

    pub fn limit(&self) -> u32 {
        self.per_page
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn prev(&self) -> Option<u32> {
        self.has_prev().then(|| self.page - 1)
    }

    pub fn next(&self) -> Option<u32> {
        self.has_next().then(|| self.page + 1)
    }

    /// First page, last page, and `siblings` pages either side of the current one.
    /// Gaps of two or more pages collapse into an ellipsis; a gap of exactly
    /// one page shows that page instead.
    pub fn items(&self, siblings: u32) -> Vec<PageItem> {
        let last = self.total_pages;
        let start = self.page.saturating_sub(siblings).max(1);
        let end = self.page.saturating_add(siblings).min(last);

        let mut items = Vec::new();
        if start > 1 {
            items.push(PageItem::Page(1));
            match start - 1 {
                1 => {}
                2 => items.push(PageItem::Page(2)),
                _ => items.push(PageItem::Ellipsis),
            }
        }
        items.extend((start..=end).map(PageItem::Page));
        if end < last {
            match last - end {
                1 => {}
                2 => items.push(PageItem::Page(last - 1)),
                _ => items.push(PageItem::Ellipsis),
            }
            items.push(PageItem::Page(last));
        }
        items
    }
}
