//! Batched application of a changeset with per-record fallback.
//!
//! Each batch is offered to the writer whole. When the writer rejects it the
//! batch-level error says nothing about which records were at fault, so every
//! item of that batch is retried on its own, exactly once. Failures are
//! recorded and the run moves on; nothing here aborts early.

use std::{fmt, num::NonZeroUsize};

use log::{debug, info, warn};
use serde::Serialize;

use crate::{
    diff::Changeset,
    store::{ChangeItem, RecordId, Store, StoreError},
};

pub const DEFAULT_BATCH_SIZE: NonZeroUsize = NonZeroUsize::new(50).unwrap();

/// Write side of a commit: one call per batch, one call per fallback item.
pub trait ChangeWriter {
    type Error: fmt::Display;

    fn write_batch(&mut self, batch: &[ChangeItem]) -> Result<(), Self::Error>;

    fn write_one(&mut self, item: &ChangeItem) -> Result<(), Self::Error>;
}

/// Routes writes for one field into a [`Store`].
pub struct FieldWriter<'a, S: Store + ?Sized> {
    store: &'a mut S,
    field: &'a str,
}

impl<'a, S: Store + ?Sized> FieldWriter<'a, S> {
    pub fn new(store: &'a mut S, field: &'a str) -> Self {
        Self { store, field }
    }
}

impl<S: Store + ?Sized> ChangeWriter for FieldWriter<'_, S> {
    type Error = StoreError;

    fn write_batch(&mut self, batch: &[ChangeItem]) -> Result<(), StoreError> {
        self.store.write_batch(self.field, batch)
    }

    fn write_one(&mut self, item: &ChangeItem) -> Result<(), StoreError> {
        self.store.write_one(self.field, item)
    }
}

struct FnWriter<B, O> {
    batch: B,
    one: O,
}

impl<B, O, E> ChangeWriter for FnWriter<B, O>
where
    B: FnMut(&[ChangeItem]) -> Result<(), E>,
    O: FnMut(&ChangeItem) -> Result<(), E>,
    E: fmt::Display,
{
    type Error = E;

    fn write_batch(&mut self, batch: &[ChangeItem]) -> Result<(), E> {
        (self.batch)(batch)
    }

    fn write_one(&mut self, item: &ChangeItem) -> Result<(), E> {
        (self.one)(item)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorLogEntry {
    pub record_id: RecordId,
    pub before: String,
    pub intended_after: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommitTally {
    pub succeeded: usize,
    pub failed: usize,
    pub batches: usize,
    pub fallbacks: usize,
    pub errors: Vec<ErrorLogEntry>,
}

pub fn commit<S: Store + ?Sized>(
    store: &mut S,
    field: &str,
    changeset: &Changeset,
    batch_size: NonZeroUsize,
) -> CommitTally {
    commit_into(&mut FieldWriter::new(store, field), changeset, batch_size)
}

pub fn commit_with<B, O, E>(
    changeset: &Changeset,
    batch_size: NonZeroUsize,
    write_batch: B,
    write_one: O,
) -> CommitTally
where
    B: FnMut(&[ChangeItem]) -> Result<(), E>,
    O: FnMut(&ChangeItem) -> Result<(), E>,
    E: fmt::Display,
{
    let mut writer = FnWriter {
        batch: write_batch,
        one: write_one,
    };
    commit_into(&mut writer, changeset, batch_size)
}

pub fn commit_into<W: ChangeWriter + ?Sized>(
    writer: &mut W,
    changeset: &Changeset,
    batch_size: NonZeroUsize,
) -> CommitTally {
    let mut tally = CommitTally::default();
    let total_batches = changeset.len().div_ceil(batch_size.get());

    for (batch_idx, batch) in changeset.batches(batch_size.get()).enumerate() {
        tally.batches += 1;
        match writer.write_batch(batch) {
            Ok(()) => {
                tally.succeeded += batch.len();
                debug!(
                    "Batch {}/{} committed ({} item(s))",
                    batch_idx + 1,
                    total_batches,
                    batch.len()
                );
            }
            Err(err) => {
                tally.fallbacks += 1;
                warn!(
                    "Batch {}/{} rejected ({err}); retrying {} item(s) individually",
                    batch_idx + 1,
                    total_batches,
                    batch.len()
                );
                for item in batch {
                    apply_single(writer, item, &mut tally);
                }
            }
        }
    }

    info!(
        "Committed {} of {} change(s) across {} batch(es); {} failed",
        tally.succeeded,
        changeset.len(),
        tally.batches,
        tally.failed
    );
    tally
}

fn apply_single<W: ChangeWriter + ?Sized>(writer: &mut W, item: &ChangeItem, tally: &mut CommitTally) {
    match writer.write_one(item) {
        Ok(()) => tally.succeeded += 1,
        Err(err) => {
            let message = err.to_string();
            debug!("Record {} failed: {message}", item.record_id);
            tally.failed += 1;
            tally.errors.push(ErrorLogEntry {
                record_id: item.record_id.clone(),
                before: item.before.clone(),
                intended_after: item.after.clone(),
                error: message,
            });
        }
    }
}
