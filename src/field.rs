//! Field descriptors and the writability guard.
//!
//! Stores describe each field with a [`FieldKind`]. A handful of kinds are
//! computed by the store itself (formulas, rollups, timestamps) and can never
//! be written; [`check_writable`] refuses those before any record is read.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    #[default]
    #[serde(alias = "singleLineText", alias = "text", alias = "string")]
    SingleLineText,
    #[serde(alias = "multilineText")]
    LongText,
    Email,
    Url,
    #[serde(alias = "phoneNumber")]
    PhoneNumber,
    Number,
    Checkbox,
    #[serde(alias = "singleSelect")]
    SingleSelect,
    Date,
    Formula,
    Rollup,
    Lookup,
    Count,
    #[serde(alias = "createdTime")]
    CreatedTime,
    #[serde(alias = "lastModifiedTime")]
    LastModifiedTime,
}

impl FieldKind {
    pub const READ_ONLY: [FieldKind; 6] = [
        FieldKind::Formula,
        FieldKind::Rollup,
        FieldKind::Lookup,
        FieldKind::Count,
        FieldKind::CreatedTime,
        FieldKind::LastModifiedTime,
    ];

    pub fn is_read_only(self) -> bool {
        Self::READ_ONLY.contains(&self)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FieldKind::SingleLineText => "single_line_text",
            FieldKind::LongText => "long_text",
            FieldKind::Email => "email",
            FieldKind::Url => "url",
            FieldKind::PhoneNumber => "phone_number",
            FieldKind::Number => "number",
            FieldKind::Checkbox => "checkbox",
            FieldKind::SingleSelect => "single_select",
            FieldKind::Date => "date",
            FieldKind::Formula => "formula",
            FieldKind::Rollup => "rollup",
            FieldKind::Lookup => "lookup",
            FieldKind::Count => "count",
            FieldKind::CreatedTime => "created_time",
            FieldKind::LastModifiedTime => "last_modified_time",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: FieldKind,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn is_writable(&self) -> bool {
        !self.kind.is_read_only()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("field '{field_name}' is a read-only field of type `{field_kind}`")]
pub struct GuardError {
    pub field_name: String,
    pub field_kind: FieldKind,
}

impl GuardError {
    /// Hint shown alongside the error: computed fields have to be
    /// normalized by another computed field, or copied somewhere editable.
    pub fn suggestion(&self) -> String {
        format!(
            "Use a formula `LOWER({{{}}})` or copy the values into an editable field.",
            self.field_name
        )
    }
}

pub fn check_writable(field: &FieldDescriptor) -> Result<(), GuardError> {
    if field.kind.is_read_only() {
        return Err(GuardError {
            field_name: field.name.clone(),
            field_kind: field.kind,
        });
    }
    Ok(())
}
