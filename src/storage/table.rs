// Table implementation
// A table combines schema, data (pages), and indexes

use super::{btree::BTreeIndex, page::PageManager, Row, Schema, Value};
use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::{debug, trace};

/// Rows per page
const PAGE_CAPACITY: usize = 128;

/// A database table
pub struct Table {
    pub name: String,
    pub schema: Schema,
    page_manager: PageManager,
    /// Indexes by column name
    indexes: HashMap<String, BTreeIndex>,
}

impl Table {
    /// Create a new table; the primary key column, if any, is indexed
    pub fn new(name: String, schema: Schema) -> Self {
        let mut indexes = HashMap::new();
        if let Some(pk_index) = schema.get_primary_key_index() {
            let pk_name = schema.columns[pk_index].name.clone();
            indexes.insert(pk_name.clone(), BTreeIndex::new(pk_name));
        }

        Self {
            name,
            schema,
            page_manager: PageManager::new(PAGE_CAPACITY),
            indexes,
        }
    }

    /// Insert a row into the table
    /// Returns the row id of the inserted row
    pub fn insert(&mut self, values: Vec<Value>) -> Result<usize> {
        if values.len() != self.schema.columns.len() {
            return Err(Error::Constraint(format!(
                "{}: expected {} values, got {}",
                self.name,
                self.schema.columns.len(),
                values.len()
            )));
        }

        for (column, value) in self.schema.columns.iter().zip(&values) {
            if value.is_null() {
                if !column.nullable {
                    return Err(Error::Constraint(format!(
                        "{}.{} cannot be NULL",
                        self.name, column.name
                    )));
                }
            } else if !column.data_type.accepts(value) {
                return Err(Error::type_mismatch(
                    format!("{} for {}.{}", column.data_type, self.name, column.name),
                    value.type_name(),
                ));
            }
        }

        // Primary key must be unique
        if let Some(pk_index) = self.schema.get_primary_key_index() {
            let pk_name = &self.schema.columns[pk_index].name;
            if let Some(index) = self.indexes.get(pk_name) {
                if index.lookup(&values[pk_index]).is_some() {
                    return Err(Error::Constraint(format!(
                        "{}: duplicate primary key {}",
                        self.name, values[pk_index]
                    )));
                }
            }
        }

        let row_id = self.page_manager.insert(Row::new(values));
        if let Some(row) = self.page_manager.get(row_id) {
            for (column, value) in self.schema.columns.iter().zip(&row.values) {
                if let Some(index) = self.indexes.get_mut(&column.name) {
                    index.insert(value.clone(), row_id);
                }
            }
        }
        trace!(table = %self.name, row_id, "row inserted");

        Ok(row_id)
    }

    /// Insert a row given as (column, value) pairs
    /// Columns that are not mentioned are NULL
    pub fn insert_record(&mut self, record: &[(&str, Value)]) -> Result<usize> {
        let mut values = vec![Value::Null; self.schema.columns.len()];
        for (column, value) in record {
            let index = self.column_index(column)?;
            values[index] = value.clone();
        }
        self.insert(values)
    }

    /// Get a row by id
    pub fn get(&self, row_id: usize) -> Option<&Row> {
        self.page_manager.get(row_id)
    }

    /// Full table scan in insertion order
    pub fn scan(&self) -> impl Iterator<Item = (usize, &Row)> + '_ {
        self.page_manager.scan()
    }

    pub fn column_index(&self, column_name: &str) -> Result<usize> {
        self.schema
            .get_column_index(column_name)
            .ok_or_else(|| Error::ColumnNotFound(format!("{}.{}", self.name, column_name)))
    }

    pub fn has_index(&self, column_name: &str) -> bool {
        self.indexes.contains_key(column_name)
    }

    /// Ids of the rows whose column equals value
    /// Uses an index when there is one, otherwise scans
    pub fn lookup(&self, column_name: &str, value: &Value) -> Result<Vec<usize>> {
        if let Some(index) = self.indexes.get(column_name) {
            return Ok(index.lookup(value).map(<[usize]>::to_vec).unwrap_or_default());
        }

        let col_index = self.column_index(column_name)?;
        Ok(self
            .scan()
            .filter(|(_id, row)| row.values[col_index].compare(value) == Some(Ordering::Equal))
            .map(|(id, _row)| id)
            .collect())
    }

    /// Ids of the rows whose column is between min and max, inclusive
    pub fn range(&self, column_name: &str, min: &Value, max: &Value) -> Result<Vec<usize>> {
        if let Some(index) = self.indexes.get(column_name) {
            return Ok(index.range_query(min, max));
        }

        let col_index = self.column_index(column_name)?;
        Ok(self
            .scan()
            .filter(|(_id, row)| {
                let value = &row.values[col_index];
                matches!(value.compare(min), Some(Ordering::Greater | Ordering::Equal))
                    && matches!(value.compare(max), Some(Ordering::Less | Ordering::Equal))
            })
            .map(|(id, _row)| id)
            .collect())
    }

    /// Create an index on a column, indexing the rows already present
    pub fn create_index(&mut self, column_name: &str) -> Result<()> {
        let col_index = self.column_index(column_name)?;

        if self.indexes.contains_key(column_name) {
            return Err(Error::Constraint(format!(
                "index already exists on {}.{}",
                self.name, column_name
            )));
        }

        let mut index = BTreeIndex::new(column_name.to_string());
        for (row_id, row) in self.page_manager.scan() {
            index.insert(row.values[col_index].clone(), row_id);
        }
        debug!(
            table = %self.name,
            column = index.column_name(),
            keys = index.len(),
            "index built"
        );

        self.indexes.insert(column_name.to_string(), index);
        Ok(())
    }

    pub fn row_count(&self) -> usize {
        self.page_manager.total_rows()
    }

    pub fn get_schema(&self) -> &Schema {
        &self.schema
    }
}
