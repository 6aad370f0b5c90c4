use serde::{Deserialize, Serialize};

/// One page of a server-side paginated listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// Rows on this page.
    pub content: Vec<T>,

    /// Number of rows across all pages.
    #[serde(default)]
    pub total_elements: Option<u64>,

    /// Number of pages reported by the backend.
    #[serde(default)]
    pub total_pages: Option<u32>,

    /// Zero-based index of this page.
    #[serde(default, alias = "number")]
    pub current_page: Option<u32>,

    /// Requested page size.
    #[serde(default, alias = "size")]
    pub page_size: Option<u32>,
}

impl<T> Page<T> {
    /// Wraps an unpaginated list as a single page.
    #[must_use]
    pub fn single(content: Vec<T>) -> Self {
        let total = content.len() as u64;
        Self {
            content,
            total_elements: Some(total),
            total_pages: Some(1),
            current_page: Some(0),
            page_size: None,
        }
    }

    /// Total row count, defaulting to the rows on this page.
    #[must_use]
    pub fn total_elements(&self) -> u64 {
        self.total_elements.unwrap_or(self.content.len() as u64)
    }
}

/// Pager state derived from a [`Page`] and the requested size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// Zero-based page index.
    pub page: u32,
    /// Rows per page.
    pub page_size: u32,
    /// Rows across all pages.
    pub total_elements: u64,
    /// `ceil(total_elements / page_size)`, never less than one.
    pub total_pages: u32,
    /// Rows rendered for this page.
    pub rows: usize,
}

impl Pagination {
    /// Derives pager state for `page` fetched at index `requested` with
    /// `page_size` rows per page.
    #[must_use]
    pub fn from_page<T>(page: &Page<T>, requested: u32, page_size: u32) -> Self {
        let total_elements = page.total_elements();
        Self {
            page: page.current_page.unwrap_or(requested),
            page_size,
            total_elements,
            total_pages: total_pages(total_elements, page_size),
            rows: page.content.len(),
        }
    }

    /// True when a previous page exists.
    #[must_use]
    pub const fn has_previous(&self) -> bool {
        self.page > 0
    }

    /// True when a following page exists.
    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.page + 1 < self.total_pages
    }

    /// One-line pager summary, e.g. `Page 2 of 5 (47 records)`.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Page {} of {} ({} records)",
            self.page + 1,
            self.total_pages,
            self.total_elements
        )
    }
}

/// `ceil(total / page_size)`, with at least one page.
#[must_use]
pub fn total_pages(total: u64, page_size: u32) -> u32 {
    if page_size == 0 {
        return 1;
    }
    let pages = total.div_ceil(u64::from(page_size)).max(1);
    u32::try_from(pages).unwrap_or(u32::MAX)
}
