//! [`Store`] implementation over a CSV file.
//!
//! Opening a store reads only the header row, so a bad target field is
//! caught before the table is loaded. [`Store::scan_records`] loads every row
//! into memory together with the raw bytes it came from; writes modify the
//! decoded copy and [`CsvStore::save`] splices the edited cells back into the
//! original bytes, leaving every other byte of the file as it was.
//!
//! Writes are conditional on the value seen during the scan: a row is only
//! updated while its cell still holds the change's `before` text. Email
//! fields also refuse values that do not look like an address.

use std::{
    collections::{BTreeMap, BTreeSet},
    fs, iter,
    ops::Range,
    path::{Path, PathBuf},
    sync::LazyLock,
};

use anyhow::{Context, Result, anyhow, bail};
use encoding_rs::{Encoding, UTF_8};
use log::{debug, info};
use regex::Regex;

use crate::{
    field::{FieldDescriptor, FieldKind},
    io_utils,
    schema::TableSchema,
    store::{ChangeItem, Record, RecordId, Store, StoreError},
    value::CellValue,
};

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@.]+$").expect("email pattern compiles")
});

#[derive(Debug, Clone)]
pub struct CsvStoreOptions {
    pub delimiter: Option<u8>,
    pub encoding: &'static Encoding,
    pub schema: Option<TableSchema>,
    /// Overrides the schema's `id_field`.
    pub id_column: Option<String>,
    /// Overrides the schema's `primary_field`.
    pub name_column: Option<String>,
}

impl Default for CsvStoreOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            encoding: UTF_8,
            schema: None,
            id_column: None,
            name_column: None,
        }
    }
}

#[derive(Debug)]
pub struct CsvStore {
    path: PathBuf,
    delimiter: u8,
    encoding: &'static Encoding,
    schema: TableSchema,
    headers: Vec<String>,
    id_column: Option<usize>,
    name_column: Option<usize>,
    table: Option<LoadedTable>,
    modified: usize,
}

/// Scanned rows plus the byte span each one occupies in the file.
#[derive(Debug)]
struct LoadedTable {
    raw: Vec<u8>,
    header_end: usize,
    spans: Vec<Range<usize>>,
    rows: Vec<Vec<String>>,
    /// Row index to the columns rewritten in that row.
    edited: BTreeMap<usize, BTreeSet<usize>>,
}

impl LoadedTable {
    /// The original bytes with every edited cell replaced, in the input encoding.
    fn splice(&self, delimiter: u8, encoding: &'static Encoding) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.raw.len());
        out.extend_from_slice(&self.raw[..self.header_end]);
        for (idx, span) in self.spans.iter().enumerate() {
            let line = &self.raw[span.clone()];
            match self.edited.get(&idx) {
                None => out.extend_from_slice(line),
                Some(columns) => splice_row(&mut out, line, &self.rows[idx], columns, delimiter, encoding)
                    .with_context(|| format!("Rewriting row {}", idx + 2))?,
            }
        }
        Ok(out)
    }
}

impl CsvStore {
    pub fn open(path: &Path, options: CsvStoreOptions) -> Result<Self> {
        let delimiter = io_utils::resolve_input_delimiter(path, options.delimiter);
        let mut reader = io_utils::open_csv_reader_from_path(path, delimiter)?;
        let headers = io_utils::reader_headers(&mut reader, options.encoding)
            .with_context(|| format!("Reading headers from {path:?}"))?;

        let schema = options
            .schema
            .unwrap_or_else(|| TableSchema::from_headers(&headers));
        schema
            .validate_headers(&headers)
            .with_context(|| format!("Validating schema against {path:?}"))?;

        let id_name = options.id_column.or_else(|| schema.id_field.clone());
        let name_name = options.name_column.or_else(|| schema.primary_field.clone());
        let id_column = resolve_column(&headers, id_name.as_deref())?;
        let name_column = resolve_column(&headers, name_name.as_deref())?;

        debug!(
            "Opened {:?}: {} column(s), id column {:?}, name column {:?}",
            path,
            headers.len(),
            id_name,
            name_name
        );
        Ok(Self {
            path: path.to_path_buf(),
            delimiter,
            encoding: options.encoding,
            schema,
            headers,
            id_column,
            name_column,
            table: None,
            modified: 0,
        })
    }

    pub fn table_name(&self) -> String {
        self.schema.table.clone().unwrap_or_else(|| {
            self.path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| "table".to_string())
        })
    }

    pub fn fields(&self) -> Vec<FieldDescriptor> {
        self.schema.describe(&self.headers)
    }

    /// Number of cells changed by writes so far.
    pub fn modified_cells(&self) -> usize {
        self.modified
    }

    /// Writes the table to `output` (or back to the input file).
    pub fn save(&self, output: Option<&Path>, encoding: &'static Encoding) -> Result<PathBuf> {
        let destination = output.unwrap_or(self.path.as_path()).to_path_buf();
        let Some(table) = &self.table else {
            bail!("Table {:?} was never loaded; nothing to save", self.path);
        };
        let spliced = table.splice(self.delimiter, self.encoding)?;
        let bytes = io_utils::transcode(&spliced, self.encoding, encoding)?;
        io_utils::replace_file(&destination, &bytes)?;
        info!(
            "Wrote {} row(s) ({} modified cell(s)) to {:?}",
            table.rows.len(),
            self.modified,
            destination
        );
        Ok(destination)
    }

    fn column(&self, field: &str) -> Result<usize, StoreError> {
        self.headers
            .iter()
            .position(|header| header == field)
            .ok_or_else(|| StoreError::FieldNotFound(field.to_string()))
    }

    fn load_table(&self) -> Result<LoadedTable, StoreError> {
        let raw = fs::read(&self.path)?;
        let mut reader = io_utils::open_csv_reader(raw.as_slice(), self.delimiter);
        reader
            .byte_headers()
            .map_err(|err| StoreError::Scan(err.to_string()))?;

        let mut record = csv::ByteRecord::new();
        let mut starts = Vec::new();
        let mut rows = Vec::new();
        loop {
            let start = reader.position().byte() as usize;
            let line = rows.len() + 2;
            let more = reader
                .read_byte_record(&mut record)
                .map_err(|err| StoreError::Scan(format!("row {line}: {err}")))?;
            if !more {
                break;
            }
            let decoded = io_utils::decode_record(&record, self.encoding)
                .map_err(|err| StoreError::Scan(format!("row {line}: {err}")))?;
            starts.push(start);
            rows.push(decoded);
        }

        let header_end = starts.first().copied().unwrap_or(raw.len());
        let spans = starts
            .iter()
            .copied()
            .zip(starts.iter().skip(1).copied().chain(iter::once(raw.len())))
            .map(|(start, end)| start..end)
            .collect();
        Ok(LoadedTable {
            raw,
            header_end,
            spans,
            rows,
            edited: BTreeMap::new(),
        })
    }

    fn record_id(&self, row_idx: usize, row: &[String]) -> RecordId {
        match self.id_column {
            Some(col) => RecordId::new(row.get(col).cloned().unwrap_or_default()),
            None => RecordId::new(format!("row-{}", row_idx + 1)),
        }
    }

    fn matching_rows(&self, rows: &[Vec<String>], column: usize, item: &ChangeItem) -> Result<Vec<usize>, StoreError> {
        let candidates = match self.id_column {
            Some(id_col) => rows
                .iter()
                .enumerate()
                .filter(|(_, row)| row.get(id_col).map(String::as_str) == Some(item.record_id.as_str()))
                .map(|(idx, _)| idx)
                .collect::<Vec<_>>(),
            None => parse_row_id(&item.record_id)
                .filter(|idx| *idx < rows.len())
                .into_iter()
                .collect(),
        };
        if candidates.is_empty() {
            return Err(StoreError::Write(format!(
                "record {} not found",
                item.record_id
            )));
        }
        let cell = |idx: usize| rows[idx].get(column).map(String::as_str);
        let current = candidates
            .iter()
            .copied()
            .filter(|idx| cell(*idx) == Some(item.before.as_str()))
            .collect::<Vec<_>>();
        // A duplicate id may already have been rewritten by an earlier item.
        let already_applied = candidates
            .iter()
            .any(|idx| cell(*idx) == Some(item.after.as_str()));
        if current.is_empty() && !already_applied {
            return Err(StoreError::Write(format!(
                "record {} changed since it was scanned",
                item.record_id
            )));
        }
        Ok(current)
    }

    /// Checks `item` against the table and returns the rows it would touch.
    fn prepare(&self, column: usize, kind: FieldKind, item: &ChangeItem) -> Result<Vec<usize>, StoreError> {
        validate_value(kind, &item.after)?;
        let table = self.table.as_ref().ok_or_else(|| {
            StoreError::Write("records must be scanned before they are written".to_string())
        })?;
        self.matching_rows(&table.rows, column, item)
    }

    /// Rewrites the targeted cells. Cells already holding `after` are left
    /// alone and not counted.
    fn apply(&mut self, column: usize, targets: &[usize], after: &str) {
        let Some(table) = self.table.as_mut() else {
            return;
        };
        for &idx in targets {
            let Some(cell) = table.rows[idx].get_mut(column) else {
                continue;
            };
            if cell.as_str() == after {
                continue;
            }
            *cell = after.to_string();
            table.edited.entry(idx).or_default().insert(column);
            self.modified += 1;
        }
    }

    fn field_kind_for_write(&self, field: &str) -> Result<(usize, FieldKind), StoreError> {
        let column = self.column(field)?;
        let kind = self.schema.kind_of(field);
        if kind.is_read_only() {
            return Err(StoreError::Write(format!(
                "field '{field}' is computed ({kind}) and cannot be written"
            )));
        }
        Ok((column, kind))
    }
}

impl Store for CsvStore {
    fn read_field(&self, name: &str) -> Result<FieldDescriptor, StoreError> {
        self.column(name)?;
        Ok(FieldDescriptor::new(name, self.schema.kind_of(name)))
    }

    fn scan_records(&mut self, field: &str) -> Result<Vec<Record>, StoreError> {
        let column = self.column(field)?;
        let kind = self.schema.kind_of(field);
        let table = self.load_table()?;

        let records = table
            .rows
            .iter()
            .enumerate()
            .map(|(idx, row)| {
                let raw = row.get(column).map(String::as_str).unwrap_or_default();
                let display_name = self
                    .name_column
                    .and_then(|col| row.get(col))
                    .filter(|name| !name.is_empty())
                    .cloned();
                Record {
                    id: self.record_id(idx, row),
                    display_name,
                    value: parse_cell(raw, kind),
                }
            })
            .collect::<Vec<_>>();

        info!(
            "Scanned {} record(s) from {:?}",
            records.len(),
            self.path
        );
        self.table = Some(table);
        Ok(records)
    }

    fn write_batch(&mut self, field: &str, items: &[ChangeItem]) -> Result<(), StoreError> {
        let (column, kind) = self.field_kind_for_write(field)?;
        let mut planned = Vec::with_capacity(items.len());
        for item in items {
            let targets = self.prepare(column, kind, item).map_err(|err| StoreError::BatchWrite {
                size: items.len(),
                message: format!("record {}: {err}", item.record_id),
            })?;
            planned.push(targets);
        }
        for (item, targets) in items.iter().zip(&planned) {
            self.apply(column, targets, &item.after);
        }
        Ok(())
    }

    fn write_one(&mut self, field: &str, item: &ChangeItem) -> Result<(), StoreError> {
        let (column, kind) = self.field_kind_for_write(field)?;
        let targets = self.prepare(column, kind, item)?;
        self.apply(column, &targets, &item.after);
        Ok(())
    }
}

fn resolve_column(headers: &[String], name: Option<&str>) -> Result<Option<usize>> {
    match name {
        None => Ok(None),
        Some(name) => headers
            .iter()
            .position(|header| header == name)
            .map(Some)
            .ok_or_else(|| anyhow!("Column '{name}' not found in headers")),
    }
}

fn parse_row_id(id: &RecordId) -> Option<usize> {
    id.as_str()
        .strip_prefix("row-")
        .and_then(|n| n.parse::<usize>().ok())
        .and_then(|n| n.checked_sub(1))
}

/// Typed cells are only produced when their text form is exactly the stored
/// text, so a change's `before` always matches the cell it was scanned from.
fn parse_cell(raw: &str, kind: FieldKind) -> CellValue {
    if raw.is_empty() {
        return CellValue::Null;
    }
    let typed = match kind {
        FieldKind::Number | FieldKind::Count => raw.parse::<f64>().ok().map(CellValue::Number),
        FieldKind::Checkbox => raw.parse::<bool>().ok().map(CellValue::Boolean),
        _ => None,
    };
    match typed {
        Some(value) if value.to_text() == raw => value,
        _ => CellValue::text(raw),
    }
}

fn splice_row(
    out: &mut Vec<u8>,
    line: &[u8],
    row: &[String],
    columns: &BTreeSet<usize>,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<()> {
    let (prefix, body, suffix) = io_utils::split_terminators(line);
    let fields = io_utils::raw_field_ranges(body, delimiter);
    if fields.len() != row.len() {
        bail!(
            "expected {} field(s) but found {} in the stored row",
            row.len(),
            fields.len()
        );
    }

    out.extend_from_slice(prefix);
    for (col, range) in fields.into_iter().enumerate() {
        if col > 0 {
            out.push(delimiter);
        }
        let original = &body[range];
        if !columns.contains(&col) {
            out.extend_from_slice(original);
            continue;
        }
        // A lone empty field would turn the row into a blank line.
        let force_quotes = original.first() == Some(&b'"') || (row.len() == 1 && row[col].is_empty());
        let field = io_utils::quote_field(&row[col], delimiter, force_quotes);
        out.extend_from_slice(&io_utils::encode_text(&field, encoding)?);
    }
    out.extend_from_slice(suffix);
    Ok(())
}

fn validate_value(kind: FieldKind, value: &str) -> Result<(), StoreError> {
    if kind == FieldKind::Email && !value.is_empty() && !EMAIL_PATTERN.is_match(value) {
        return Err(StoreError::Write(format!("invalid email address '{value}'")));
    }
    Ok(())
}
