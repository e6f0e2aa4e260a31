//! Pagination helper for tabular dashboard views.

use serde::{Deserialize, Serialize};

/// Pagination state. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: usize,
    pub page_size: usize,
    pub total_items: usize,
    pub total_pages: usize,
}

impl Pagination {
    /// Compute pagination, clamping `page` into `1..=total_pages`.
    pub fn calculate(total_items: usize, page: usize, page_size: usize) -> Self {
        let page_size = page_size.max(1);
        let total_pages = total_items.div_ceil(page_size);
        let page = page.min(total_pages).max(1);
        Self {
            page,
            page_size,
            total_items,
            total_pages,
        }
    }

    /// Items on this page.
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = self.offset().min(items.len());
        let end = (start + self.page_size).min(items.len());
        &items[start..end]
    }

    /// Zero-based offset of the first item on this page.
    pub fn offset(&self) -> usize {
        self.page.saturating_sub(1) * self.page_size
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_clamps_page() {
        let p = Pagination::calculate(95, 20, 10);
        assert_eq!(p.total_pages, 10);
        assert_eq!(p.page, 10);

        let p = Pagination::calculate(95, 0, 10);
        assert_eq!(p.page, 1);

        let p = Pagination::calculate(0, 3, 10);
        assert_eq!(p.total_pages, 0);
        assert_eq!(p.page, 1);
    }

    #[test]
    fn test_slice_and_navigation() {
        let items: Vec<u32> = (1..=25).collect();
        let p = Pagination::calculate(items.len(), 3, 10);
        assert_eq!(p.slice(&items), &[21, 22, 23, 24, 25]);
        assert_eq!(p.offset(), 20);
        assert!(!p.has_next());
        assert!(p.has_previous());

        let first = Pagination::calculate(items.len(), 1, 10);
        assert!(first.has_next());
        assert!(!first.has_previous());
    }

    #[test]
    fn test_page_zero_reads_as_first_page() {
        let items: Vec<u32> = (1..=5).collect();
        let p = Pagination {
            page: 0,
            page_size: 2,
            total_items: 5,
            total_pages: 3,
        };
        assert_eq!(p.offset(), 0);
        assert_eq!(p.slice(&items), &[1, 2]);
        assert!(!p.has_previous());
    }

    #[test]
    fn test_slice_of_empty() {
        let items: Vec<u32> = Vec::new();
        let p = Pagination::calculate(0, 1, 10);
        assert!(p.slice(&items).is_empty());
    }
}
