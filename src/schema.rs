//! Table schema: field kinds plus the id and display-name columns.
//!
//! CSV files carry no type information, so the kind of each field (and in
//! particular whether it is computed, hence read-only) comes from a small
//! YAML document:
//!
//! ```yaml
//! table: Contacts
//! primary_field: Name
//! id_field: Record ID
//! fields:
//!   - name: Email Address
//!     type: email
//!   - name: Email (lower)
//!     type: formula
//! ```
//!
//! Columns missing from `fields` are treated as `single_line_text`.

use std::{
    collections::HashSet,
    fs::File,
    io::BufReader,
    path::Path,
};

use anyhow::{Context, Result, anyhow, bail};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::field::{FieldDescriptor, FieldKind};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    /// Column whose value names a record in previews and error logs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_field: Option<String>,
    /// Column holding stable record ids. Row numbers are used without it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_field: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
}

impl TableSchema {
    pub fn from_headers(headers: &[String]) -> Self {
        Self {
            fields: headers
                .iter()
                .map(|name| FieldDescriptor::new(name.clone(), FieldKind::default()))
                .collect(),
            ..Self::default()
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening schema file {path:?}"))?;
        let schema: TableSchema =
            serde_yaml::from_reader(BufReader::new(file)).context("Parsing schema YAML")?;
        schema.validate()?;
        Ok(schema)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        let file = File::create(path).with_context(|| format!("Creating schema file {path:?}"))?;
        serde_yaml::to_writer(file, self).context("Writing schema YAML")
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn kind_of(&self, name: &str) -> FieldKind {
        self.field(name).map(|field| field.kind).unwrap_or_default()
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for field in &self.fields {
            if field.name.trim().is_empty() {
                bail!("Schema contains a field with an empty name");
            }
            if !seen.insert(field.name.as_str()) {
                bail!("Field '{}' is declared more than once", field.name);
            }
        }
        Ok(())
    }

    /// Every declared field and the id/primary columns must exist in the file.
    pub fn validate_headers(&self, headers: &[String]) -> Result<()> {
        let present = headers.iter().map(String::as_str).collect::<HashSet<_>>();
        let missing = self
            .fields
            .iter()
            .filter(|field| !present.contains(field.name.as_str()))
            .map(|field| format!("'{}'", field.name))
            .collect::<Vec<_>>();
        if !missing.is_empty() {
            return Err(anyhow!(
                "Schema field(s) {} not found in headers: {}",
                missing.iter().join(", "),
                headers.iter().join(", ")
            ));
        }
        for (role, column) in [
            ("id_field", self.id_field.as_deref()),
            ("primary_field", self.primary_field.as_deref()),
        ] {
            if let Some(column) = column
                && !present.contains(column)
            {
                bail!("Schema {role} '{column}' not found in headers");
            }
        }
        Ok(())
    }

    /// One descriptor per header, in file order.
    pub fn describe(&self, headers: &[String]) -> Vec<FieldDescriptor> {
        headers
            .iter()
            .map(|name| FieldDescriptor::new(name.clone(), self.kind_of(name)))
            .collect()
    }
}
