//! The filtered, paginated slice of the collection shown in the table.

use crate::model::{Category, Transaction};
use serde::Serialize;

/// The number of rows on a page.
pub const PAGE_SIZE: usize = 5;

/// One page of the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page {
    pub items: Vec<Transaction>,
    /// 1-based.
    pub page: usize,
    pub has_prev: bool,
    pub has_next: bool,
    /// The number of transactions that pass the filter, on all pages.
    pub filtered_count: usize,
}

impl Page {
    /// The number of pages, never less than one.
    pub fn page_count(&self) -> usize {
        self.filtered_count.div_ceil(PAGE_SIZE).max(1)
    }
}

/// Returns the transactions matching `filter`, all of them when there is none.
pub fn filtered(transactions: &[Transaction], filter: Option<Category>) -> Vec<&Transaction> {
    transactions
        .iter()
        .filter(|t| filter.is_none_or(|c| t.category() == c))
        .collect()
}

/// Returns page `page` (1-based, 0 is treated as 1) of the transactions matching `filter`. A page
/// past the end is empty.
pub fn page_of(transactions: &[Transaction], filter: Option<Category>, page: usize) -> Page {
    let page = page.max(1);
    let matching = filtered(transactions, filter);
    let filtered_count = matching.len();
    let items = matching
        .into_iter()
        .skip((page - 1).saturating_mul(PAGE_SIZE))
        .take(PAGE_SIZE)
        .cloned()
        .collect();
    Page {
        items,
        page,
        has_prev: page > 1,
        has_next: page.saturating_mul(PAGE_SIZE) < filtered_count,
        filtered_count,
    }
}
