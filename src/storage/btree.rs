// B-Tree Index
// Keeps column values sorted so equality lookups and range scans (BETWEEN)
// don't have to walk the whole table

use super::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Index structure using Rust's built-in BTreeMap
/// Maps a column value to the ids of the rows holding it, in insertion order
#[derive(Debug, Clone)]
pub struct BTreeIndex {
    tree: BTreeMap<IndexKey, Vec<usize>>,
    /// Name of the indexed column
    column_name: String,
}

/// Wrapper for Value to make it totally ordered
/// Same-typed values use Value::compare; otherwise NULL sorts first and the
/// remaining types are grouped by a fixed rank
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexKey(pub Value);

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Boolean(_) => 1,
        Value::Integer(_) => 2,
        Value::Date(_) => 3,
        Value::Text(_) => 4,
    }
}

impl PartialOrd for IndexKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IndexKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .compare(&other.0)
            .unwrap_or_else(|| type_rank(&self.0).cmp(&type_rank(&other.0)))
    }
}

impl BTreeIndex {
    /// Create a new B-Tree index for a specific column
    pub fn new(column_name: String) -> Self {
        Self {
            tree: BTreeMap::new(),
            column_name,
        }
    }

    /// Insert a value into the index
    pub fn insert(&mut self, value: Value, row_id: usize) {
        self.tree.entry(IndexKey(value)).or_default().push(row_id);
    }

    /// Look up a value in the index
    pub fn lookup(&self, value: &Value) -> Option<&[usize]> {
        self.tree
            .get(&IndexKey(value.clone()))
            .map(|ids| ids.as_slice())
    }

    /// Range query: all row ids whose value is between min and max, inclusive
    ///
    /// Results come back in key order. An inverted range is empty.
    pub fn range_query(&self, min: &Value, max: &Value) -> Vec<usize> {
        let min_key = IndexKey(min.clone());
        let max_key = IndexKey(max.clone());

        if min_key > max_key {
            return Vec::new();
        }

        let mut result = Vec::new();
        for (_key, row_ids) in self.tree.range(min_key..=max_key) {
            result.extend(row_ids);
        }

        result
    }

    pub fn column_name(&self) -> &str {
        &self.column_name
    }

    /// Get the number of distinct values in the index
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> Value {
        Value::Date(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    #[test]
    fn test_btree_insert_and_lookup() {
        let mut index = BTreeIndex::new("identity".to_string());

        index.insert(Value::from("Margot Robbie"), 0);
        index.insert(Value::from("Jared Leto"), 1);
        index.insert(Value::from("Margot Robbie"), 2);

        assert_eq!(index.lookup(&Value::from("Margot Robbie")), Some(&[0, 2][..]));
        assert_eq!(index.lookup(&Value::from("Will Smith")), None);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_btree_range_query_is_inclusive() {
        let mut index = BTreeIndex::new("birth_date".to_string());

        index.insert(date(1984, 12, 31), 0);
        index.insert(date(1985, 1, 1), 1);
        index.insert(date(1985, 7, 1), 2);
        index.insert(date(1985, 12, 31), 3);
        index.insert(date(1986, 1, 1), 4);

        let result = index.range_query(&date(1985, 1, 1), &date(1985, 12, 31));
        assert_eq!(result, vec![1, 2, 3]);
    }

    #[test]
    fn test_btree_inverted_range_is_empty() {
        let mut index = BTreeIndex::new("year".to_string());
        index.insert(Value::Integer(2015), 0);

        assert!(index
            .range_query(&Value::Integer(2020), &Value::Integer(2010))
            .is_empty());
    }

    #[test]
    fn test_btree_nulls_do_not_collide_with_values() {
        let mut index = BTreeIndex::new("birth_date".to_string());
        index.insert(Value::Null, 0);
        index.insert(date(1990, 7, 2), 1);

        assert_eq!(index.lookup(&Value::Null), Some(&[0][..]));
        assert_eq!(index.range_query(&date(1900, 1, 1), &date(2000, 1, 1)), vec![1]);
    }
}
