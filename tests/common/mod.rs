#![allow(dead_code)]

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use email_normalize::{
    field::{FieldDescriptor, FieldKind},
    store::{ChangeItem, Record, Store, StoreError},
};
use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    pub fn read(&self, name: &str) -> String {
        fs::read_to_string(self.temp_dir.path().join(name)).expect("read workspace file")
    }
}

/// In-memory store with scripted failures and a call log.
///
/// Batches containing any id in `failing` are rejected as a whole; the same
/// ids also fail when written one at a time.
pub struct ScriptedStore {
    pub fields: Vec<FieldDescriptor>,
    pub records: Vec<Record>,
    pub failing: HashSet<String>,
    pub fail_scan: bool,
    pub scans: usize,
    pub batch_calls: Vec<usize>,
    pub single_calls: Vec<String>,
    pub written: Vec<ChangeItem>,
}

impl ScriptedStore {
    pub fn new(field: &str, kind: FieldKind, records: Vec<Record>) -> Self {
        Self {
            fields: vec![FieldDescriptor::new(field, kind)],
            records,
            failing: HashSet::new(),
            fail_scan: false,
            scans: 0,
            batch_calls: Vec::new(),
            single_calls: Vec::new(),
            written: Vec::new(),
        }
    }

    pub fn failing_on(mut self, ids: &[&str]) -> Self {
        self.failing = ids.iter().map(|id| id.to_string()).collect();
        self
    }

    pub fn write_calls(&self) -> usize {
        self.batch_calls.len() + self.single_calls.len()
    }

    fn rejects(&self, item: &ChangeItem) -> bool {
        self.failing.contains(item.record_id.as_str())
    }
}

impl Store for ScriptedStore {
    fn read_field(&self, name: &str) -> Result<FieldDescriptor, StoreError> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .cloned()
            .ok_or_else(|| StoreError::FieldNotFound(name.to_string()))
    }

    fn scan_records(&mut self, _field: &str) -> Result<Vec<Record>, StoreError> {
        self.scans += 1;
        if self.fail_scan {
            return Err(StoreError::Scan("connection reset".to_string()));
        }
        Ok(self.records.clone())
    }

    fn write_batch(&mut self, _field: &str, items: &[ChangeItem]) -> Result<(), StoreError> {
        self.batch_calls.push(items.len());
        if let Some(bad) = items.iter().find(|item| self.rejects(item)) {
            return Err(StoreError::BatchWrite {
                size: items.len(),
                message: format!("record {} rejected", bad.record_id),
            });
        }
        self.written.extend_from_slice(items);
        Ok(())
    }

    fn write_one(&mut self, _field: &str, item: &ChangeItem) -> Result<(), StoreError> {
        self.single_calls.push(item.record_id.to_string());
        if self.rejects(item) {
            return Err(StoreError::Write(format!(
                "invalid email address '{}'",
                item.after
            )));
        }
        self.written.push(item.clone());
        Ok(())
    }
}
