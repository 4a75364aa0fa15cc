use std::collections::HashMap;

use serde::Serialize;

use crate::{
    diff::Changeset,
    store::{Record, RecordId},
};

/// Id → record lookup over a scan, used to turn change items back into
/// human readable labels. The first record wins when a store repeats an id.
pub struct RecordIndex<'a> {
    by_id: HashMap<&'a RecordId, &'a Record>,
}

impl<'a> RecordIndex<'a> {
    pub fn new(records: &'a [Record]) -> Self {
        let mut by_id = HashMap::with_capacity(records.len());
        for record in records {
            by_id.entry(&record.id).or_insert(record);
        }
        Self { by_id }
    }

    pub fn get(&self, id: &RecordId) -> Option<&'a Record> {
        self.by_id.get(id).copied()
    }

    pub fn label(&self, id: &RecordId) -> String {
        self.get(id)
            .map(|record| record.label().to_string())
            .unwrap_or_else(|| id.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewRow {
    pub label: String,
    pub before: String,
    pub after: String,
}

impl PreviewRow {
    pub const HEADERS: [&'static str; 3] = ["Record", "Before", "After"];

    pub fn cells(&self) -> Vec<String> {
        vec![self.label.clone(), self.before.clone(), self.after.clone()]
    }
}

pub fn preview(changeset: &Changeset, records: &RecordIndex<'_>, limit: usize) -> Vec<PreviewRow> {
    changeset
        .iter()
        .take(limit)
        .map(|item| PreviewRow {
            label: records.label(&item.record_id),
            before: item.before.clone(),
            after: item.after.clone(),
        })
        .collect()
}
