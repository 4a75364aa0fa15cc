use std::{num::NonZeroUsize, path::PathBuf};

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Lowercase and trim an email column, dry run first",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Dry-run the normalization of one field, then optionally commit it
    Normalize(NormalizeArgs),
    /// List the fields of a table with their types and writability
    Fields(FieldsArgs),
}

#[derive(Debug, Args)]
pub struct NormalizeArgs {
    /// Input CSV file holding the table
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Field (column) to normalize
    #[arg(short = 'f', long = "field", default_value = "Email Address")]
    pub field: String,
    /// YAML schema describing field types, id and primary fields
    #[arg(short = 's', long = "schema")]
    pub schema: Option<PathBuf>,
    /// Table name used in reports (defaults to the schema's table or the file stem)
    #[arg(long = "table")]
    pub table: Option<String>,
    /// Column holding stable record ids (defaults to row numbers)
    #[arg(long = "id-column")]
    pub id_column: Option<String>,
    /// Column used to label records in previews and error logs
    #[arg(long = "name-column")]
    pub name_column: Option<String>,
    /// Where to write the updated table (defaults to rewriting the input)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Number of updates submitted per batch
    #[arg(long = "batch-size", default_value = "50")]
    pub batch_size: NonZeroUsize,
    /// Number of pending changes shown before confirmation
    #[arg(long = "preview-limit", default_value_t = 10)]
    pub preview_limit: usize,
    /// Maximum number of failed records listed in the final error log
    #[arg(long = "error-limit", default_value_t = 50)]
    pub error_limit: usize,
    /// Stop after the dry run without prompting
    #[arg(long = "dry-run", conflicts_with = "yes")]
    pub dry_run: bool,
    /// Commit without prompting
    #[arg(short = 'y', long = "yes")]
    pub yes: bool,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Character encoding for the written table (defaults to the input encoding)
    #[arg(long = "output-encoding")]
    pub output_encoding: Option<String>,
    /// Write the run report as JSON to this path
    #[arg(long = "summary-json")]
    pub summary_json: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct FieldsArgs {
    /// Input CSV file holding the table
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// YAML schema describing field types
    #[arg(short = 's', long = "schema")]
    pub schema: Option<PathBuf>,
    /// Write a schema template covering every column to this path
    #[arg(long = "emit-schema")]
    pub emit_schema: Option<PathBuf>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delimiter_aliases_resolve() {
        assert_eq!(parse_delimiter("tab"), Ok(b'\t'));
        assert_eq!(parse_delimiter(";"), Ok(b';'));
        assert!(parse_delimiter("ab").is_err());
        assert!(parse_delimiter("").is_err());
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let parsed = Cli::try_parse_from([
            "email-normalize",
            "normalize",
            "-i",
            "contacts.csv",
            "--batch-size",
            "0",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn dry_run_conflicts_with_yes() {
        let parsed = Cli::try_parse_from([
            "email-normalize",
            "normalize",
            "-i",
            "contacts.csv",
            "--dry-run",
            "--yes",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn defaults_match_documented_values() {
        let cli = Cli::try_parse_from(["email-normalize", "normalize", "-i", "contacts.csv"])
            .expect("parse");
        let Commands::Normalize(args) = cli.command else {
            panic!("expected normalize command");
        };
        assert_eq!(args.field, "Email Address");
        assert_eq!(args.batch_size.get(), 50);
        assert_eq!(args.preview_limit, 10);
        assert_eq!(args.error_limit, 50);
    }
}
