// Storage module - the in-memory relational store the queries run against
// Rows live in pages, lookups go through B-Tree indexes

pub mod btree;
pub mod dataset;
pub mod page;
pub mod table;

use crate::error::{Error, Result};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Represents a single row in a table
/// Values are positional and follow the table's schema
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Row {
    pub values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Get the value at a column position
    pub fn get(&self, index: usize) -> Result<&Value> {
        self.values
            .get(index)
            .ok_or_else(|| Error::ColumnNotFound(format!("#{}", index)))
    }

    pub fn integer(&self, index: usize) -> Result<i64> {
        match self.get(index)? {
            Value::Integer(i) => Ok(*i),
            other => Err(Error::type_mismatch("INTEGER", other.type_name())),
        }
    }

    pub fn text(&self, index: usize) -> Result<String> {
        match self.get(index)? {
            Value::Text(s) => Ok(s.clone()),
            other => Err(Error::type_mismatch("TEXT", other.type_name())),
        }
    }

    /// A nullable DATE column
    pub fn optional_date(&self, index: usize) -> Result<Option<NaiveDate>> {
        match self.get(index)? {
            Value::Date(d) => Ok(Some(*d)),
            Value::Null => Ok(None),
            other => Err(Error::type_mismatch("DATE", other.type_name())),
        }
    }
}

/// A single column value
/// Query parameters are bound as Values too, so this is also the parameter type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Value {
    Null,
    Integer(i64),
    Text(String),
    Boolean(bool),
    Date(NaiveDate),
}

impl Value {
    /// Parse a bare literal as typed on the command line
    ///
    /// Integers and ISO dates (YYYY-MM-DD) are recognised, so are `true`,
    /// `false` and `null`. Anything else is text; wrap it in single quotes to
    /// force text for something that looks like a number.
    pub fn parse_literal(input: &str) -> Value {
        let input = input.trim();

        if input.len() >= 2 && input.starts_with('\'') && input.ends_with('\'') {
            return Value::Text(input[1..input.len() - 1].to_string());
        }
        if let Ok(i) = input.parse::<i64>() {
            return Value::Integer(i);
        }
        if let Ok(d) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
            return Value::Date(d);
        }

        match input.to_ascii_lowercase().as_str() {
            "true" => Value::Boolean(true),
            "false" => Value::Boolean(false),
            "null" => Value::Null,
            _ => Value::Text(input.to_string()),
        }
    }

    /// Compare two values
    /// Values of different types (and NULL) are not comparable
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Integer(_) => "INTEGER",
            Value::Text(_) => "TEXT",
            Value::Boolean(_) => "BOOLEAN",
            Value::Date(_) => "DATE",
        }
    }

    /// The calendar year of a DATE
    pub fn year(&self) -> Option<i64> {
        match self {
            Value::Date(d) => Some(i64::from(d.year())),
            _ => None,
        }
    }

    pub fn month(&self) -> Option<i64> {
        match self {
            Value::Date(d) => Some(i64::from(d.month())),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Text(s) => write!(f, "{}", s),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Date(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Represents the schema (structure) of a table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    pub columns: Vec<Column>,
}

/// Represents a single column definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
    pub primary_key: bool,
    pub nullable: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            primary_key: false,
            nullable: false,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }
}

/// The data types the store supports
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DataType {
    Integer,
    Text,
    Boolean,
    Date,
}

impl DataType {
    /// Whether a non-null value has this type
    pub fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (DataType::Integer, Value::Integer(_))
                | (DataType::Text, Value::Text(_))
                | (DataType::Boolean, Value::Boolean(_))
                | (DataType::Date, Value::Date(_))
        )
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Integer => "INTEGER",
            DataType::Text => "TEXT",
            DataType::Boolean => "BOOLEAN",
            DataType::Date => "DATE",
        };
        f.write_str(name)
    }
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    /// Find the index of a column by name
    pub fn get_column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|col| col.name == name)
    }

    /// Get the primary key column index
    pub fn get_primary_key_index(&self) -> Option<usize> {
        self.columns.iter().position(|col| col.primary_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_literal() {
        assert_eq!(Value::parse_literal("2015"), Value::Integer(2015));
        assert_eq!(
            Value::parse_literal("1985-01-01"),
            Value::Date(NaiveDate::from_ymd_opt(1985, 1, 1).unwrap())
        );
        assert_eq!(
            Value::parse_literal(" Ridley Scott "),
            Value::Text("Ridley Scott".to_string())
        );
        assert_eq!(Value::parse_literal("'2015'"), Value::Text("2015".to_string()));
        assert_eq!(Value::parse_literal("TRUE"), Value::Boolean(true));
        assert_eq!(Value::parse_literal("null"), Value::Null);
    }

    #[test]
    fn test_compare_mixed_types() {
        assert_eq!(Value::Integer(1).compare(&Value::Integer(2)), Some(Ordering::Less));
        assert_eq!(Value::Integer(1).compare(&Value::Text("1".into())), None);
        assert_eq!(Value::Null.compare(&Value::Null), None);
    }

    #[test]
    fn test_row_accessors() {
        let row = Row::new(vec![
            Value::Integer(7),
            Value::from("Marion Cotillard"),
            Value::Null,
        ]);
        assert_eq!(row.integer(0).unwrap(), 7);
        assert_eq!(row.text(1).unwrap(), "Marion Cotillard");
        assert_eq!(row.optional_date(2).unwrap(), None);
        assert!(matches!(row.integer(1), Err(Error::TypeMismatch { .. })));
        assert!(matches!(row.get(5), Err(Error::ColumnNotFound(_))));
    }
}
