//! Run summaries and the reporting sink they are written to.
//!
//! [`summarize`] is pure; the `render_*` helpers turn summaries into
//! headings, lines and tables on any [`Reporter`].

use std::{
    io::{self, Write},
    time::Duration,
};

use serde::Serialize;

use crate::{
    commit::{CommitTally, ErrorLogEntry},
    diff::Changeset,
    preview::{PreviewRow, RecordIndex},
    table,
};

pub const DEFAULT_ERROR_LIMIT: usize = 50;

/// Output sink. Implementations decide how text and tables are drawn.
pub trait Reporter {
    fn heading(&mut self, text: &str) -> io::Result<()>;

    fn line(&mut self, text: &str) -> io::Result<()>;

    fn table(&mut self, headers: &[String], rows: &[Vec<String>]) -> io::Result<()>;
}

/// Plain-text reporter; stdout for the CLI, a `Vec<u8>` in tests.
pub struct ConsoleReporter<W: Write> {
    out: W,
}

impl ConsoleReporter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Reporter for ConsoleReporter<W> {
    fn heading(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "\n## {text}")
    }

    fn line(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "{text}")
    }

    fn table(&mut self, headers: &[String], rows: &[Vec<String>]) -> io::Result<()> {
        write!(self.out, "{}", table::render_table(headers, rows))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DryRunReport {
    pub scanned: usize,
    pub would_update: usize,
    pub elapsed_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub scanned: usize,
    pub changed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub batches: usize,
    pub fallbacks: usize,
    pub elapsed_seconds: f64,
    pub errors: Vec<ErrorLogEntry>,
    /// Error entries left out of `errors` by the display limit.
    pub errors_omitted: usize,
}

pub fn dry_run_report(scanned: usize, changeset: &Changeset, elapsed: Duration) -> DryRunReport {
    DryRunReport {
        scanned,
        would_update: changeset.len(),
        elapsed_seconds: elapsed.as_secs_f64(),
    }
}

pub fn summarize(
    scanned: usize,
    changeset: &Changeset,
    tally: &CommitTally,
    elapsed: Duration,
    error_limit: usize,
) -> RunSummary {
    let shown = tally.errors.len().min(error_limit);
    RunSummary {
        scanned,
        changed: changeset.len(),
        succeeded: tally.succeeded,
        failed: tally.failed,
        batches: tally.batches,
        fallbacks: tally.fallbacks,
        elapsed_seconds: elapsed.as_secs_f64(),
        errors: tally.errors[..shown].to_vec(),
        errors_omitted: tally.errors.len() - shown,
    }
}

pub fn render_dry_run(reporter: &mut dyn Reporter, report: &DryRunReport) -> io::Result<()> {
    reporter.heading("Dry run complete - no changes made")?;
    reporter.line(&format!("- Scanned: {}", report.scanned))?;
    reporter.line(&format!("- Would update: {}", report.would_update))?;
    reporter.line(&format!("- Duration: {:.1}s", report.elapsed_seconds))
}

pub fn render_preview(reporter: &mut dyn Reporter, rows: &[PreviewRow]) -> io::Result<()> {
    if rows.is_empty() {
        return Ok(());
    }
    reporter.line(&format!("Preview of first {} change(s):", rows.len()))?;
    let headers = PreviewRow::HEADERS.map(String::from);
    let cells = rows.iter().map(PreviewRow::cells).collect::<Vec<_>>();
    reporter.table(&headers, &cells)
}

pub fn render_summary(
    reporter: &mut dyn Reporter,
    summary: &RunSummary,
    records: &RecordIndex<'_>,
) -> io::Result<()> {
    reporter.heading("Update complete")?;
    reporter.line(&format!("- Scanned: {}", summary.scanned))?;
    reporter.line(&format!("- Needed changes: {}", summary.changed))?;
    reporter.line(&format!("- Successfully updated: {}", summary.succeeded))?;
    reporter.line(&format!("- Failed: {}", summary.failed))?;
    reporter.line(&format!("- Total duration: {:.1}s", summary.elapsed_seconds))?;

    if summary.errors.is_empty() {
        return Ok(());
    }
    reporter.heading(&format!(
        "Error log (showing {} of {})",
        summary.errors.len(),
        summary.errors.len() + summary.errors_omitted
    ))?;
    let headers = ["Record", "Before", "Intended after", "Error"].map(String::from);
    let rows = summary
        .errors
        .iter()
        .map(|entry| {
            vec![
                records.label(&entry.record_id),
                entry.before.clone(),
                entry.intended_after.clone(),
                entry.error.clone(),
            ]
        })
        .collect::<Vec<_>>();
    reporter.table(&headers, &rows)
}
