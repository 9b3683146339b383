//! Embedded key-value store contract.
//!
//! Records declare their primary key and indexed fields through a static
//! [`Schema`]; the store only ever filters on those fields.

use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

pub mod sqlite;

pub use sqlite::SqliteStore;

/// Errors raised by a [`KvStore`] implementation.
#[derive(Error, Debug)]
pub enum StoreError {
    /// An SQLite error.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A record body could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// No record matched.
    #[error("Record not found")]
    NotFound,

    /// A record with this key already exists.
    #[error("Key already exists: {0}")]
    KeyExists(String),

    /// The filter names a field the schema does not declare.
    #[error("Field is not declared in schema `{table}`: {field}")]
    UnknownField {
        table: &'static str,
        field: &'static str,
    },
}

/// The role a field plays in a [`Schema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    PrimaryKey,
    Indexed,
}

/// The stored representation of an indexed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Timestamp,
}

/// A single field declaration.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub role: FieldRole,
    pub kind: FieldKind,
}

/// Static description of a record type: where it lives and which fields
/// can be filtered on.
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    pub table: &'static str,
    pub fields: &'static [FieldSpec],
}

impl Schema {
    /// Returns the declaration for `field`, if any.
    pub fn field(&self, field: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == field)
    }

    /// Returns the declared indexed (non-key) fields.
    pub fn indexed(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.role == FieldRole::Indexed)
    }
}

/// A value that can appear in a filter or an indexed column.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Time(DateTime<Utc>),
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::Time(value)
    }
}

/// Predicate over the declared fields of a record.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(&'static str, FieldValue),
    Gt(&'static str, FieldValue),
    Le(&'static str, FieldValue),
    And(Box<Filter>, Box<Filter>),
}

impl Filter {
    pub fn eq(field: &'static str, value: impl Into<FieldValue>) -> Self {
        Filter::Eq(field, value.into())
    }

    pub fn gt(field: &'static str, value: impl Into<FieldValue>) -> Self {
        Filter::Gt(field, value.into())
    }

    pub fn le(field: &'static str, value: impl Into<FieldValue>) -> Self {
        Filter::Le(field, value.into())
    }

    /// Conjunction of `self` and `other`.
    pub fn and(self, other: Filter) -> Self {
        Filter::And(Box::new(self), Box::new(other))
    }
}

/// A type that can be persisted in a [`KvStore`].
pub trait Record: Serialize + DeserializeOwned {
    const SCHEMA: Schema;

    /// The primary key of this record.
    fn key(&self) -> &str;

    /// The current value of an indexed field declared in [`Record::SCHEMA`].
    fn indexed_value(&self, field: &str) -> Option<FieldValue>;
}

/// An embedded store with per-key atomic writes and indexed lookups.
///
/// Implementations must be safe to share between request workers and the
/// expiry sweeper; no cross-operation transaction is implied.
pub trait KvStore: Send + Sync + 'static {
    /// Creates storage for `schema` if it does not exist yet.
    fn register(&self, schema: &Schema) -> Result<(), StoreError>;

    fn insert<R: Record>(&self, key: &str, record: &R) -> Result<(), StoreError>;

    fn update<R: Record>(&self, key: &str, record: &R) -> Result<(), StoreError>;

    /// Deletes the record stored under `key`, returning whether one existed.
    fn delete<R: Record>(&self, key: &str) -> Result<bool, StoreError>;

    /// Returns the first record matching `filter`, or [`StoreError::NotFound`].
    fn find_one<R: Record>(&self, filter: &Filter) -> Result<R, StoreError>;

    /// Deletes every record matching `filter`, returning how many were removed.
    fn delete_matching<R: Record>(&self, filter: &Filter) -> Result<usize, StoreError>;

    fn count<R: Record>(&self, filter: Option<&Filter>) -> Result<usize, StoreError>;
}
