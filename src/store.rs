//! The capability boundary between the normalization engine and a table.
//!
//! A [`Store`] hands out field descriptors and record snapshots and accepts
//! write requests. The engine never mutates records directly; every change
//! goes through [`Store::write_batch`] or [`Store::write_one`].

use std::{fmt, io};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{field::FieldDescriptor, value::CellValue};

/// Opaque, stable record identifier issued by a store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: RecordId,
    pub display_name: Option<String>,
    pub value: CellValue,
}

impl Record {
    pub fn new(id: impl Into<RecordId>, value: impl Into<CellValue>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
            value: value.into(),
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Human readable name when the store has one, otherwise the id.
    pub fn label(&self) -> &str {
        match self.display_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => self.id.as_str(),
        }
    }
}

/// A single pending update: `after` replaces `before` on one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeItem {
    pub record_id: RecordId,
    pub before: String,
    pub after: String,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("field '{0}' does not exist in this table")]
    FieldNotFound(String),
    #[error("unable to read records: {0}")]
    Scan(String),
    #[error("batch of {size} update(s) rejected: {message}")]
    BatchWrite { size: usize, message: String },
    #[error("{0}")]
    Write(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub trait Store {
    fn read_field(&self, name: &str) -> Result<FieldDescriptor, StoreError>;

    /// Snapshot of every record's value for `field`, in table order.
    fn scan_records(&mut self, field: &str) -> Result<Vec<Record>, StoreError>;

    /// Applies every item or none of them.
    fn write_batch(&mut self, field: &str, items: &[ChangeItem]) -> Result<(), StoreError>;

    fn write_one(&mut self, field: &str, item: &ChangeItem) -> Result<(), StoreError>;
}
