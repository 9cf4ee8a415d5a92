//! services/web/src/forms/pagination.rs
//!
//! The browse page's `?page=` query and the pagination control it renders.

use matchmaking_core::{PageItem, Pagination};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Pages shown either side of the current one in the control.
pub const PAGE_SIBLINGS: u32 = 1;

#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PaginationQuery {
    /// 1-based page number; defaults to the first page.
    #[validate(range(min = 1, message = "must be at least 1"))]
    pub page: Option<u32>,
}

impl PaginationQuery {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "kind", content = "page", rename_all = "snake_case")]
pub enum PageItemView {
    Page(u32),
    Ellipsis,
}

impl From<PageItem> for PageItemView {
    fn from(item: PageItem) -> Self {
        match item {
            PageItem::Page(n) => Self::Page(n),
            PageItem::Ellipsis => Self::Ellipsis,
        }
    }
}

/// Everything a page needs to render the pagination control.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaginationView {
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub total_pages: u32,
    pub prev: Option<u32>,
    pub next: Option<u32>,
    pub items: Vec<PageItemView>,
}

impl From<&Pagination> for PaginationView {
    fn from(p: &Pagination) -> Self {
        Self {
            page: p.page,
            per_page: p.per_page,
            total: p.total,
            total_pages: p.total_pages,
            prev: p.prev(),
            next: p.next(),
            items: p.items(PAGE_SIBLINGS).into_iter().map(Into::into).collect(),
        }
    }
}
