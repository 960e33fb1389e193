//! Pagination utilities for service layer
//!
//! Offset/limit windows and the list response envelope.

use serde::Serialize;

use crate::storage::Document;

pub const DEFAULT_SKIP: u64 = 0;
pub const DEFAULT_LIMIT: u64 = 50;

/// Offset-based page window
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pagination {
    /// records to skip
    pub skip: u64,
    /// records per page, never zero
    pub limit: u64,
}

impl Pagination {
    /// Fill unset values with the defaults. `None` when the limit is zero.
    pub fn resolve(skip: Option<u64>, limit: Option<u64>) -> Option<Self> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT);
        if limit == 0 {
            return None;
        }
        Some(Self { skip: skip.unwrap_or(DEFAULT_SKIP), limit })
    }

    /// 1-based page index: `floor(skip / limit) + 1`, saturating at `u64::MAX`
    pub fn page_number(&self) -> u64 {
        (self.skip / self.limit).saturating_add(1)
    }
}

impl Default for Pagination {
    fn default() -> Self { Self { skip: DEFAULT_SKIP, limit: DEFAULT_LIMIT } }
}

/// List response. Page metadata is present only for paginated queries.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PaginatedResult {
    pub results: Vec<Document>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_record_count: Option<u64>,
}

impl PaginatedResult {
    pub fn unpaged(results: Vec<Document>) -> Self {
        Self { results, skip: None, limit: None, page_size: None, page_number: None, total_record_count: None }
    }

    pub fn paged(results: Vec<Document>, window: Pagination, total_record_count: u64) -> Self {
        Self {
            results,
            skip: Some(window.skip),
            limit: Some(window.limit),
            page_size: Some(window.limit),
            page_number: Some(window.page_number()),
            total_record_count: Some(total_record_count),
        }
    }

    pub fn is_paged(&self) -> bool {
        self.page_number.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_fills_defaults() {
        let p = Pagination::resolve(None, None).unwrap();
        assert_eq!(p, Pagination::default());
        assert_eq!(p.page_number(), 1);
    }

    #[test]
    fn page_number_floors() {
        assert_eq!(Pagination { skip: 10, limit: 10 }.page_number(), 2);
        assert_eq!(Pagination { skip: 19, limit: 10 }.page_number(), 2);
        assert_eq!(Pagination { skip: 5, limit: 10 }.page_number(), 1);
    }

    #[test]
    fn page_number_saturates_at_the_largest_offset() {
        assert_eq!(Pagination { skip: u64::MAX, limit: 1 }.page_number(), u64::MAX);
        assert_eq!(Pagination { skip: u64::MAX, limit: 2 }.page_number(), u64::MAX / 2 + 1);
    }

    #[test]
    fn zero_limit_is_rejected() {
        assert!(Pagination::resolve(Some(0), Some(0)).is_none());
    }

    #[test]
    fn unpaged_serializes_results_only() {
        let v = serde_json::to_value(PaginatedResult::unpaged(vec![])).unwrap();
        assert_eq!(v, serde_json::json!({"results": []}));
        let v = serde_json::to_value(PaginatedResult::paged(vec![], Pagination { skip: 20, limit: 10 }, 42)).unwrap();
        assert_eq!(
            v,
            serde_json::json!({"results": [], "skip": 20, "limit": 10, "page_size": 10, "page_number": 3, "total_record_count": 42})
        );
    }
}
