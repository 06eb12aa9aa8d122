//! Offset pagination helpers.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaginationError {
    #[error("page_index must be at least 1")]
    InvalidPageIndex,
    #[error("page_size must be between 1 and {max}")]
    InvalidPageSize { max: u32 },
    #[error("page window starting at index {page_index} exceeds the supported offset range")]
    OffsetOverflow { page_index: u32 },
}

/// A validated, 1-based page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page_index: u32,
    page_size: u32,
}

impl PageRequest {
    /// Validate a page window. `max_page_size` is the configured ceiling.
    pub fn new(page_index: u32, page_size: u32, max_page_size: u32) -> Result<Self, PaginationError> {
        if page_index < 1 {
            return Err(PaginationError::InvalidPageIndex);
        }
        if page_size < 1 || page_size > max_page_size {
            return Err(PaginationError::InvalidPageSize { max: max_page_size });
        }

        let request = Self {
            page_index,
            page_size,
        };
        if i64::try_from(request.offset()).is_err() {
            return Err(PaginationError::OffsetOverflow { page_index });
        }
        Ok(request)
    }

    pub fn page_index(&self) -> u32 {
        self.page_index
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Number of filtered rows skipped before this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page_index - 1) * u64::from(self.page_size)
    }
}

/// One page of an ordered, filtered result set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page_index: u32,
    pub page_size: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, request: PageRequest) -> Self {
        Self {
            items,
            total,
            page_index: request.page_index(),
            page_size: request.page_size(),
        }
    }

    pub fn total_pages(&self) -> u64 {
        if self.page_size == 0 {
            return 0;
        }
        self.total.div_ceil(u64::from(self.page_size))
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page_index: self.page_index,
            page_size: self.page_size,
        }
    }
}
