//! End-to-end run: guard, scan, diff, dry-run report, confirmation, commit,
//! summary.
//!
//! All per-run state lives in a [`RunContext`] owned by [`execute`]; nothing
//! is global. Fatal conditions (missing or read-only field, failed scan,
//! broken prompt or output) surface as [`RunError`]. All of them except a
//! failed summary write happen before any write is attempted.
//! Everything after the confirmation gate runs to completion.

use std::{
    io,
    num::NonZeroUsize,
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;
use thiserror::Error;

use crate::{
    commit::{self, DEFAULT_BATCH_SIZE},
    confirm::{Confirm, ConfirmOption, Decision},
    diff::{Changeset, compute_changeset},
    field::{GuardError, check_writable},
    preview::{RecordIndex, preview},
    report::{self, DEFAULT_ERROR_LIMIT, DryRunReport, Reporter, RunSummary},
    store::{Store, StoreError},
};

pub const DEFAULT_PREVIEW_LIMIT: usize = 10;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub table: String,
    pub field: String,
    pub batch_size: NonZeroUsize,
    pub preview_limit: usize,
    pub error_limit: usize,
}

impl RunOptions {
    pub fn new(table: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            field: field.into(),
            batch_size: DEFAULT_BATCH_SIZE,
            preview_limit: DEFAULT_PREVIEW_LIMIT,
            error_limit: DEFAULT_ERROR_LIMIT,
        }
    }
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("{0}")]
    FieldNotFound(StoreError),
    #[error(transparent)]
    ReadOnlyField(#[from] GuardError),
    #[error("scan failed: {0}")]
    Scan(StoreError),
    #[error("confirmation prompt failed: {0}")]
    Confirm(io::Error),
    #[error("unable to write report: {0}")]
    Report(#[from] io::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every value was already canonical.
    Unchanged { dry_run: DryRunReport },
    /// Changes were found but the confirmation gate kept the dry run.
    Declined { dry_run: DryRunReport },
    Committed {
        dry_run: DryRunReport,
        summary: RunSummary,
    },
}

impl RunOutcome {
    pub fn dry_run(&self) -> &DryRunReport {
        match self {
            RunOutcome::Unchanged { dry_run }
            | RunOutcome::Declined { dry_run }
            | RunOutcome::Committed { dry_run, .. } => dry_run,
        }
    }

    pub fn summary(&self) -> Option<&RunSummary> {
        match self {
            RunOutcome::Committed { summary, .. } => Some(summary),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub table: String,
    pub field: String,
    pub started_at: DateTime<Utc>,
    #[serde(flatten)]
    pub outcome: RunOutcome,
}

pub struct RunContext {
    started_at: DateTime<Utc>,
    started: Instant,
}

impl RunContext {
    pub fn start() -> Self {
        Self {
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

pub fn execute<S, C>(
    store: &mut S,
    confirm: &mut C,
    reporter: &mut dyn Reporter,
    options: &RunOptions,
) -> Result<RunReport, RunError>
where
    S: Store + ?Sized,
    C: Confirm + ?Sized,
{
    let ctx = RunContext::start();
    let field_name = options.field.as_str();

    let field = match store.read_field(field_name) {
        Ok(field) => field,
        Err(err) => {
            reporter.heading(&format!("Field \"{field_name}\" not found in {}", options.table))?;
            return Err(RunError::FieldNotFound(err));
        }
    };
    if let Err(err) = check_writable(&field) {
        reporter.heading(&format!(
            "\"{}\" is a read-only field of type `{}`",
            err.field_name, err.field_kind
        ))?;
        reporter.line(&err.suggestion())?;
        return Err(err.into());
    }

    let records = store.scan_records(field_name).map_err(RunError::Scan)?;
    let changeset = compute_changeset(&records);
    let dry_run = report::dry_run_report(records.len(), &changeset, ctx.elapsed());
    info!(
        "Dry run over {}.{}: {} scanned, {} to update",
        options.table,
        field_name,
        dry_run.scanned,
        dry_run.would_update
    );
    report::render_dry_run(reporter, &dry_run)?;

    let finish = |outcome| RunReport {
        table: options.table.clone(),
        field: options.field.clone(),
        started_at: ctx.started_at,
        outcome,
    };

    if changeset.is_empty() {
        reporter.line(&format!(
            "Everything is already lowercase in {}.{}. Nothing to do.",
            options.table, field_name
        ))?;
        return Ok(finish(RunOutcome::Unchanged { dry_run }));
    }

    let index = RecordIndex::new(&records);
    report::render_preview(reporter, &preview(&changeset, &index, options.preview_limit))?;

    if confirm_commit(confirm, &changeset).map_err(RunError::Confirm)? != Decision::Proceed {
        reporter.line("Stopping after dry run. No changes were made.")?;
        return Ok(finish(RunOutcome::Declined { dry_run }));
    }

    let tally = commit::commit(store, field_name, &changeset, options.batch_size);
    let summary = report::summarize(
        records.len(),
        &changeset,
        &tally,
        ctx.elapsed(),
        options.error_limit,
    );
    if summary.failed > 0 {
        warn!(
            "{} of {} update(s) failed; see the error log",
            summary.failed, summary.changed
        );
    }
    report::render_summary(reporter, &summary, &index)?;
    Ok(finish(RunOutcome::Committed { dry_run, summary }))
}

fn confirm_commit<C: Confirm + ?Sized>(confirm: &mut C, changeset: &Changeset) -> io::Result<Decision> {
    let options = [
        ConfirmOption::new("No (keep dry run only)", Decision::KeepDryRun),
        ConfirmOption::new(
            format!("Yes, update {} record(s)", changeset.len()),
            Decision::Proceed,
        ),
    ];
    confirm.confirm("Proceed with updates now?", &options)
}
