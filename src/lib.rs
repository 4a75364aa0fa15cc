pub mod cli;
pub mod commit;
pub mod confirm;
pub mod csv_store;
pub mod diff;
pub mod field;
pub mod io_utils;
pub mod normalize;
pub mod preview;
pub mod report;
pub mod run;
pub mod schema;
pub mod store;
pub mod table;
pub mod value;

use std::{env, fs::File, io::BufWriter, path::Path, sync::OnceLock};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    cli::{Cli, Commands, FieldsArgs, NormalizeArgs},
    confirm::{Confirm, Decision, Preset, Prompt},
    csv_store::{CsvStore, CsvStoreOptions},
    report::ConsoleReporter,
    run::{RunError, RunOptions, RunReport},
    schema::TableSchema,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("email_normalize", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Normalize(args) => handle_normalize(&args),
        Commands::Fields(args) => handle_fields(&args),
    }
}

fn handle_normalize(args: &NormalizeArgs) -> Result<()> {
    let input_encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let output_encoding = match args.output_encoding.as_deref() {
        Some(label) => io_utils::resolve_encoding(Some(label))?,
        None => input_encoding,
    };
    let schema = load_schema(args.schema.as_deref())?;
    info!(
        "Normalizing field '{}' in '{}' (delimiter '{}')",
        args.field,
        args.input.display(),
        printable_delimiter(io_utils::resolve_input_delimiter(&args.input, args.delimiter))
    );

    let mut store = CsvStore::open(
        &args.input,
        CsvStoreOptions {
            delimiter: args.delimiter,
            encoding: input_encoding,
            schema,
            id_column: args.id_column.clone(),
            name_column: args.name_column.clone(),
        },
    )
    .with_context(|| format!("Opening table {:?}", args.input))?;

    let options = RunOptions {
        table: args.table.clone().unwrap_or_else(|| store.table_name()),
        field: args.field.clone(),
        batch_size: args.batch_size,
        preview_limit: args.preview_limit,
        error_limit: args.error_limit,
    };
    debug!("Run options: {options:?}");

    let mut confirm: Box<dyn Confirm> = if args.dry_run {
        Box::new(Preset(Decision::KeepDryRun))
    } else if args.yes {
        Box::new(Preset(Decision::Proceed))
    } else {
        Box::new(Prompt::stdin())
    };
    let mut reporter = ConsoleReporter::stdout();

    let result = run::execute(&mut store, confirm.as_mut(), &mut reporter, &options);

    // Committed cells are persisted even when reporting failed afterwards.
    if store.modified_cells() > 0 {
        let written = store
            .save(args.output.as_deref(), output_encoding)
            .context("Saving updated table")?;
        info!("Updated table written to {:?}", written);
    }
    let report = result.map_err(|err| describe_run_error(err, &options))?;
    if let Some(path) = &args.summary_json {
        write_run_report(path, &report)?;
    }
    Ok(())
}

fn handle_fields(args: &FieldsArgs) -> Result<()> {
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let schema = load_schema(args.schema.as_deref())?;
    let store = CsvStore::open(
        &args.input,
        CsvStoreOptions {
            delimiter: args.delimiter,
            encoding,
            schema: schema.clone(),
            ..CsvStoreOptions::default()
        },
    )
    .with_context(|| format!("Opening table {:?}", args.input))?;

    let fields = store.fields();
    let rows = fields
        .iter()
        .enumerate()
        .map(|(idx, field)| {
            vec![
                (idx + 1).to_string(),
                field.name.clone(),
                field.kind.to_string(),
                if field.is_writable() { "yes" } else { "no" }.to_string(),
            ]
        })
        .collect::<Vec<_>>();
    let headers = ["#", "name", "type", "writable"].map(String::from);
    table::print_table(&headers, &rows);

    if let Some(path) = &args.emit_schema {
        let mut template = schema.unwrap_or_default();
        template.table.get_or_insert_with(|| store.table_name());
        template.fields = fields;
        template
            .save(path)
            .with_context(|| format!("Writing schema to {path:?}"))?;
        info!("Schema template for {} field(s) written to {:?}", template.fields.len(), path);
    }
    Ok(())
}

fn load_schema(path: Option<&Path>) -> Result<Option<TableSchema>> {
    path.map(|path| {
        TableSchema::load(path).with_context(|| format!("Loading schema from {path:?}"))
    })
    .transpose()
}

fn describe_run_error(err: RunError, options: &RunOptions) -> anyhow::Error {
    match err {
        RunError::ReadOnlyField(guard) => {
            anyhow!("{guard}. {}", guard.suggestion())
        }
        RunError::FieldNotFound(inner) => {
            anyhow!("{inner} (table '{}')", options.table)
        }
        other => anyhow!(other),
    }
}

fn write_run_report(path: &Path, report: &RunReport) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Creating summary file {path:?}"))?;
    serde_json::to_writer_pretty(BufWriter::new(file), report)
        .with_context(|| format!("Writing summary to {path:?}"))?;
    info!("Run report written to {:?}", path);
    Ok(())
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
