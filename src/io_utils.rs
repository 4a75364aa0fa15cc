//! CSV reading/writing helpers: delimiter and encoding resolution, record
//! decoding, raw field scanning for in-place edits, and atomic file
//! replacement.
//!
//! Input is decoded through `encoding_rs` (UTF-8 unless told otherwise) and
//! output is transcoded back the same way. Files are replaced by writing a
//! sibling temp file and renaming it over the target, so an interrupted save
//! never leaves a half-written table behind.

use std::{
    borrow::Cow,
    fs::{self, File},
    io::{BufReader, Read, Write},
    ops::Range,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use encoding_rs::{Encoding, UTF_8};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

pub fn open_csv_reader<R: Read>(reader: R, delimiter: u8) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(false)
        .from_reader(reader)
}

pub fn open_csv_reader_from_path(path: &Path, delimiter: u8) -> Result<csv::Reader<BufReader<File>>> {
    let file = File::open(path).with_context(|| format!("Opening input file {path:?}"))?;
    Ok(open_csv_reader(BufReader::new(file), delimiter))
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

pub fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

pub fn reader_headers<R: Read>(
    reader: &mut csv::Reader<R>,
    encoding: &'static Encoding,
) -> Result<Vec<String>> {
    let headers = reader.byte_headers().context("Reading header row")?.clone();
    decode_record(&headers, encoding)
}

/// Splits a row's bytes into its leading line terminators, the record body,
/// and its trailing line terminators.
pub fn split_terminators(line: &[u8]) -> (&[u8], &[u8], &[u8]) {
    let is_terminator = |byte: &u8| matches!(byte, b'\r' | b'\n');
    let start = line.iter().position(|b| !is_terminator(b)).unwrap_or(line.len());
    let end = line.iter().rposition(|b| !is_terminator(b)).map_or(start, |idx| idx + 1);
    (&line[..start], &line[start..end], &line[end..])
}

/// Byte ranges of each raw field in a record body, quotes included.
pub fn raw_field_ranges(body: &[u8], delimiter: u8) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    let mut idx = 0;
    while idx < body.len() {
        let byte = body[idx];
        if quoted {
            if byte == b'"' {
                if body.get(idx + 1) == Some(&b'"') {
                    idx += 1;
                } else {
                    quoted = false;
                }
            }
        } else if byte == b'"' && idx == start {
            quoted = true;
        } else if byte == delimiter {
            ranges.push(start..idx);
            start = idx + 1;
        }
        idx += 1;
    }
    ranges.push(start..body.len());
    ranges
}

/// Quotes `value` when it holds the delimiter, a quote or a line break, or
/// when `force` is set.
pub fn quote_field(value: &str, delimiter: u8, force: bool) -> Cow<'_, str> {
    let needs_quotes = force
        || value
            .bytes()
            .any(|byte| byte == delimiter || matches!(byte, b'"' | b'\r' | b'\n'));
    if needs_quotes {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

pub fn encode_text(text: &str, encoding: &'static Encoding) -> Result<Vec<u8>> {
    let (encoded, _, had_errors) = encoding.encode(text);
    if had_errors {
        return Err(anyhow!(
            "Output contains characters that cannot be encoded as {}",
            encoding.name()
        ));
    }
    Ok(encoded.into_owned())
}

/// Re-encodes a whole file, returning it untouched when both encodings match.
pub fn transcode<'a>(
    bytes: &'a [u8],
    from: &'static Encoding,
    to: &'static Encoding,
) -> Result<Cow<'a, [u8]>> {
    if from == to {
        return Ok(Cow::Borrowed(bytes));
    }
    let (text, had_errors) = from.decode_with_bom_removal(bytes);
    if had_errors {
        return Err(anyhow!(
            "Failed to decode text with encoding {}",
            from.name()
        ));
    }
    encode_text(&text, to).map(Cow::Owned)
}

/// Writes `bytes` to a temp file next to `path`, then renames it into place.
pub fn replace_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let temp = temp_sibling(path);
    let mut file = File::create(&temp).with_context(|| format!("Creating temp file {temp:?}"))?;
    file.write_all(bytes)
        .and_then(|()| file.sync_all())
        .with_context(|| format!("Writing temp file {temp:?}"))?;
    drop(file);
    fs::rename(&temp, path).with_context(|| format!("Replacing {path:?}"))
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "output".into());
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::WINDOWS_1252;
    use tempfile::tempdir;

    #[test]
    fn delimiter_follows_extension_unless_provided() {
        assert_eq!(resolve_input_delimiter(Path::new("a.tsv"), None), b'\t');
        assert_eq!(resolve_input_delimiter(Path::new("a.csv"), None), b',');
        assert_eq!(resolve_input_delimiter(Path::new("a.tsv"), Some(b';')), b';');
    }

    #[test]
    fn unknown_encoding_is_an_error() {
        assert!(resolve_encoding(Some("klingon")).is_err());
        assert_eq!(resolve_encoding(Some("latin1")).unwrap(), WINDOWS_1252);
        assert_eq!(resolve_encoding(None).unwrap(), UTF_8);
    }

    #[test]
    fn terminators_are_split_from_the_record_body() {
        assert_eq!(
            split_terminators(b"\n\"Ada\",a@x.io\r"),
            (&b"\n"[..], &b"\"Ada\",a@x.io"[..], &b"\r"[..])
        );
        assert_eq!(split_terminators(b"x,y"), (&b""[..], &b"x,y"[..], &b""[..]));
        assert_eq!(split_terminators(b"\r\n"), (&b"\r\n"[..], &b""[..], &b""[..]));
    }

    #[test]
    fn raw_fields_respect_quotes_and_escaped_quotes() {
        let body = b"\"Doe, \"\"J\"\"\",,a@x.io";
        let fields = raw_field_ranges(body, b',')
            .into_iter()
            .map(|range| &body[range])
            .collect::<Vec<_>>();
        assert_eq!(fields, vec![&b"\"Doe, \"\"J\"\"\""[..], &b""[..], &b"a@x.io"[..]]);
        assert_eq!(raw_field_ranges(b"", b',').len(), 1);
        assert_eq!(raw_field_ranges(b"a\tb", b'\t'), vec![0..1, 2..3]);
    }

    #[test]
    fn quote_field_only_when_needed_or_forced() {
        assert_eq!(quote_field("a@x.io", b',', false), "a@x.io");
        assert_eq!(quote_field("a@x.io", b',', true), "\"a@x.io\"");
        assert_eq!(quote_field("Müller, Jo", b',', false), "\"Müller, Jo\"");
        assert_eq!(quote_field("say \"hi\"", b';', false), "\"say \"\"hi\"\"\"");
        assert_eq!(quote_field("a,b", b';', false), "a,b");
    }

    #[test]
    fn transcode_only_when_encodings_differ() {
        let utf8 = "Name\r\nMüller\r\n".as_bytes();
        assert!(matches!(transcode(utf8, UTF_8, UTF_8).unwrap(), Cow::Borrowed(_)));

        let latin = transcode(utf8, UTF_8, WINDOWS_1252).expect("to cp1252");
        assert_eq!(&latin[..], b"Name\r\nM\xfcller\r\n");
        assert!(encode_text("\u{2603}", WINDOWS_1252).is_err());
    }

    #[test]
    fn replace_file_overwrites_and_cleans_up() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("table.csv");
        fs::write(&path, "old").expect("seed file");
        replace_file(&path, b"new").expect("replace");
        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
        assert!(!dir.path().join("table.csv.tmp").exists());
    }
}
