//! Query parameter and result types for store read paths.
//!
//! All queries are tenant-scoped and paginated by default.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_catalog::{ProductId, VariantId};
use stockroom_inventory::{MovementType, ReceiptStatus, ReceiptType};

/// Pagination parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Pagination {
    /// Maximum number of records to return.
    pub limit: u32,
    /// Offset for pagination (0-based).
    pub offset: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: 50, // Safe default
            offset: 0,
        }
    }
}

impl Pagination {
    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self {
            limit: limit.unwrap_or(50).min(1000), // Cap at 1000 for safety
            offset: offset.unwrap_or(0),
        }
    }
}

/// Filter criteria for receipt listings.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReceiptFilter {
    pub status: Option<ReceiptStatus>,
    pub receipt_type: Option<ReceiptType>,
}

/// Filter criteria for movement-history queries.
#[derive(Debug, Clone, Copy, Default)]
pub struct MovementFilter {
    pub variant_id: Option<VariantId>,
    pub product_id: Option<ProductId>,
    pub movement_type: Option<MovementType>,
    pub occurred_after: Option<DateTime<Utc>>,
    pub occurred_before: Option<DateTime<Utc>>,
}

/// Paginated query result.
#[derive(Debug, Clone)]
pub struct Page<T> {
    /// Records for the requested page, newest first.
    pub items: Vec<T>,
    /// Total number of records matching the filter (across all pages).
    pub total: u64,
    /// Pagination parameters used.
    pub pagination: Pagination,
    /// Whether more records are available past this page.
    pub has_more: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, pagination: Pagination) -> Self {
        let has_more = u64::from(pagination.offset) + (items.len() as u64) < total;
        Self {
            items,
            total,
            pagination,
            has_more,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_caps_limit() {
        let p = Pagination::new(Some(10_000), None);
        assert_eq!(p.limit, 1000);
        assert_eq!(p.offset, 0);
    }

    #[test]
    fn page_reports_remaining_records() {
        let page = Page::new(vec![1, 2, 3], 10, Pagination::new(Some(3), Some(0)));
        assert!(page.has_more);

        let last = Page::new(vec![10], 10, Pagination::new(Some(3), Some(9)));
        assert!(!last.has_more);
    }
}
