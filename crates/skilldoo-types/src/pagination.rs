use serde::Serialize;

pub const MAX_PAGE_SIZE: u32 = 100;

/// A clamped page request. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Page {
    pub fn new(page: Option<u32>, limit: Option<u32>, default_limit: u32) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(default_limit).clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.limit as i64
    }

    pub fn limit(&self) -> i64 {
        self.limit as i64
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total_count: u64,
    pub total_pages: u64,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

impl Pagination {
    pub fn new(page: Page, total_count: u64) -> Self {
        let total_pages = total_count.div_ceil(page.limit as u64);
        Self {
            page: page.page,
            limit: page.limit,
            total_count,
            total_pages,
            has_next_page: (page.page as u64) < total_pages,
            has_previous_page: page.page > 1,
        }
    }
}

/// Uniform list envelope returned by every paginated endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, page: Page, total_count: u64) -> Self {
        Self {
            items,
            pagination: Pagination::new(page, total_count),
        }
    }
}
