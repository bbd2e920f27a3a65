// Page-based storage
// Rows are grouped into fixed-capacity pages; a row id encodes the page and
// the slot inside it, so a lookup by id is two vector indexes

use super::Row;
use serde::{Deserialize, Serialize};

/// A fixed-capacity block of rows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub id: usize,
    pub rows: Vec<Row>,
    /// Maximum number of rows per page
    pub max_rows: usize,
}

impl Page {
    pub fn new(id: usize, max_rows: usize) -> Self {
        Self {
            id,
            rows: Vec::with_capacity(max_rows),
            max_rows,
        }
    }

    /// Insert a row into the page
    /// Returns false if the page is full
    pub fn insert(&mut self, row: Row) -> bool {
        if self.is_full() {
            return false;
        }

        self.rows.push(row);
        true
    }

    pub fn is_full(&self) -> bool {
        self.rows.len() >= self.max_rows
    }

    pub fn get(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Page Manager - owns the pages of one table
/// Pages are append-only: the store is loaded once and then only read
#[derive(Debug)]
pub struct PageManager {
    pages: Vec<Page>,
    max_rows_per_page: usize,
}

impl PageManager {
    pub fn new(max_rows_per_page: usize) -> Self {
        Self {
            pages: Vec::new(),
            max_rows_per_page: max_rows_per_page.max(1),
        }
    }

    /// Append a row, opening a new page when the last one is full
    /// Returns the row id (page_id * max_rows_per_page + slot)
    pub fn insert(&mut self, row: Row) -> usize {
        if self.pages.last().map_or(true, Page::is_full) {
            let page_id = self.pages.len();
            self.pages.push(Page::new(page_id, self.max_rows_per_page));
        }

        let last = self.pages.len() - 1;
        let page = &mut self.pages[last];
        let slot = page.len();
        page.insert(row);

        page.id * self.max_rows_per_page + slot
    }

    /// Get a row by global row id
    pub fn get(&self, row_id: usize) -> Option<&Row> {
        let page_id = row_id / self.max_rows_per_page;
        let row_index = row_id % self.max_rows_per_page;

        self.pages.get(page_id)?.get(row_index)
    }

    /// Iterate over all rows with their row ids, in insertion order
    pub fn scan(&self) -> impl Iterator<Item = (usize, &Row)> + '_ {
        let per_page = self.max_rows_per_page;
        self.pages.iter().flat_map(move |page| {
            page.rows
                .iter()
                .enumerate()
                .map(move |(slot, row)| (page.id * per_page + slot, row))
        })
    }

    /// Get the total number of rows across all pages
    pub fn total_rows(&self) -> usize {
        self.pages.iter().map(Page::len).sum()
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Value;

    fn row(i: i64) -> Row {
        Row::new(vec![Value::Integer(i)])
    }

    #[test]
    fn test_rows_spill_into_new_pages() {
        let mut pages = PageManager::new(2);
        let ids: Vec<usize> = (0..5).map(|i| pages.insert(row(i))).collect();

        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        assert_eq!(pages.page_count(), 3);
        assert_eq!(pages.total_rows(), 5);
        assert_eq!(pages.get(3), Some(&row(3)));
        assert_eq!(pages.get(5), None);
    }

    #[test]
    fn test_scan_preserves_insertion_order() {
        let mut pages = PageManager::new(3);
        for i in 0..7 {
            pages.insert(row(i * 10));
        }

        let scanned: Vec<(usize, i64)> = pages
            .scan()
            .map(|(id, r)| (id, r.integer(0).unwrap()))
            .collect();
        assert_eq!(scanned.len(), 7);
        assert_eq!(scanned[0], (0, 0));
        assert_eq!(scanned[6], (6, 60));
    }
}
