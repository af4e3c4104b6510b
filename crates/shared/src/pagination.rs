//! Offset pagination utilities.

use serde::{Deserialize, Serialize};

/// Page size used when the caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Largest page size a caller may request.
pub const MAX_PAGE_SIZE: u32 = 100;

/// A validated page request (1-based page number).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    /// Builds a page request, clamping out-of-range values instead of failing.
    ///
    /// Page 0 becomes page 1; a page size of 0 becomes the default and sizes
    /// above `max_page_size` are capped.
    pub fn new(page: Option<u32>, page_size: Option<u32>, max_page_size: u32) -> Self {
        let page = page.unwrap_or(1).max(1);
        let page_size = match page_size {
            None | Some(0) => DEFAULT_PAGE_SIZE.min(max_page_size),
            Some(size) => size.min(max_page_size),
        };
        Self { page, page_size }
    }

    /// Number of rows to skip.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }

    /// Number of rows to fetch.
    pub fn limit(&self) -> u64 {
        u64::from(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None, MAX_PAGE_SIZE)
    }
}

/// One page of results with totals.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub total_pages: u32,
}

impl<T> Page<T> {
    /// Wraps a fetched slice of results.
    pub fn new(items: Vec<T>, request: PageRequest, total: u64) -> Self {
        let total_pages = total.div_ceil(u64::from(request.page_size)) as u32;
        Self {
            items,
            page: request.page,
            page_size: request.page_size,
            total,
            total_pages,
        }
    }

    /// Converts the items while keeping the page metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            page_size: self.page_size,
            total: self.total,
            total_pages: self.total_pages,
        }
    }
}
