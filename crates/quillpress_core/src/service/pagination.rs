//! Page options and page envelopes.
//!
//! # Invariants
//! - `page` and `limit` are at least 1.
//! - `meta.item_count` equals `items.len()`.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginateOptions {
    /// 1-based page.
    pub page: u32,
    pub limit: u32,
}

impl Default for PaginateOptions {
    fn default() -> Self {
        Self { page: 1, limit: 10 }
    }
}

impl PaginateOptions {
    /// Non-positive inputs clamp to 1.
    pub fn new(page: i64, limit: i64) -> Self {
        Self {
            page: clamp_positive(page),
            limit: clamp_positive(limit),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.max(1) - 1) * u64::from(self.limit.max(1))
    }
}

fn clamp_positive(value: i64) -> u32 {
    u32::try_from(value.max(1)).unwrap_or(u32::MAX)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    pub item_count: usize,
    pub total_items: u64,
    pub per_page: u32,
    pub total_pages: u64,
    pub current_page: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pagination<T> {
    pub items: Vec<T>,
    pub meta: PaginationMeta,
}

impl<T> Pagination<T> {
    /// Wraps one already-sliced page of a query with `total` matches.
    pub fn from_page(items: Vec<T>, total: u64, options: PaginateOptions) -> Self {
        let limit = options.limit.max(1);
        Self {
            meta: PaginationMeta {
                item_count: items.len(),
                total_items: total,
                per_page: limit,
                total_pages: total.div_ceil(u64::from(limit)),
                current_page: options.page.max(1),
            },
            items,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Pagination<U> {
        Pagination {
            items: self.items.into_iter().map(f).collect(),
            meta: self.meta,
        }
    }
}

/// Slices the full `data` list in memory.
///
/// A page past the end is empty but keeps the totals.
pub fn tree_paginate<T>(options: PaginateOptions, data: Vec<T>) -> Pagination<T> {
    let total = data.len();
    let start = usize::try_from(options.offset()).unwrap_or(usize::MAX);
    let limit = usize::try_from(options.limit.max(1)).unwrap_or(usize::MAX);
    let items = data.into_iter().skip(start).take(limit).collect();
    Pagination::from_page(items, u64::try_from(total).unwrap_or(u64::MAX), options)
}

#[cfg(test)]
mod tests {
    use super::{tree_paginate, PaginateOptions};

    #[test]
    fn options_clamp_to_one() {
        assert_eq!(PaginateOptions::new(0, -5), PaginateOptions { page: 1, limit: 1 });
        assert_eq!(PaginateOptions::new(3, 10).offset(), 20);
    }

    #[test]
    fn second_page_of_seven() {
        let page = tree_paginate(PaginateOptions::new(2, 3), (1..=7).collect::<Vec<_>>());
        assert_eq!(page.items, vec![4, 5, 6]);
        assert_eq!(page.meta.total_items, 7);
        assert_eq!(page.meta.total_pages, 3);
        assert_eq!(page.meta.item_count, 3);
        assert_eq!(page.meta.current_page, 2);
    }

    #[test]
    fn last_and_past_end_pages() {
        let last = tree_paginate(PaginateOptions::new(3, 3), (1..=7).collect::<Vec<_>>());
        assert_eq!(last.items, vec![7]);

        let past = tree_paginate(PaginateOptions::new(9, 3), (1..=7).collect::<Vec<_>>());
        assert!(past.items.is_empty());
        assert_eq!(past.meta.total_items, 7);
        assert_eq!(past.meta.item_count, 0);
    }
}
