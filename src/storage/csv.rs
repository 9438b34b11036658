//! CSV Storage Module
//!
//! Loads and saves tables as delimited text.
//!
//! ## Format
//!
//! - First row is header with column names (unless `has_header` is off)
//! - Column types are inferred from every value in the column:
//!   - Integers: all values parse as i64
//!   - Floats: all values parse as f64
//!   - Booleans: all values are "true"/"false" (case-insensitive)
//!   - Strings: anything else, or any quoted value
//! - An unquoted empty field is null; `""` is the empty string
//!
//! ## Example
//!
//! ```csv
//! CustomerID,Segment,Spend
//! 1,retail,120.5
//! 2,"",80
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use tracing::debug;

use crate::relation::Batch;
use crate::storage::error::{StorageError, StorageResult};
use crate::value::{DataType, Schema, Tuple, Value};

/// Options for CSV parsing
#[derive(Debug, Clone)]
pub struct CsvOptions {
    /// Field delimiter (default: ',')
    pub delimiter: char,
    /// Whether the first row contains headers (default: true)
    pub has_header: bool,
    /// Quote character for strings (default: '"')
    pub quote_char: char,
    /// Whether to trim whitespace around unquoted fields (default: true)
    pub trim_whitespace: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        CsvOptions {
            delimiter: ',',
            has_header: true,
            quote_char: '"',
            trim_whitespace: true,
        }
    }
}

/// One parsed field
#[derive(Debug, Clone, PartialEq)]
struct RawField {
    text: String,
    quoted: bool,
}

/// Load a CSV file with default options
pub fn load_csv<P: AsRef<Path>>(path: P) -> StorageResult<Batch> {
    load_csv_with_options(path, &CsvOptions::default())
}

/// Load a CSV file, inferring one type per column
pub fn load_csv_with_options<P: AsRef<Path>>(path: P, options: &CsvOptions) -> StorageResult<Batch> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);

    let mut header: Option<Vec<String>> = None;
    let mut records: Vec<Vec<RawField>> = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = index + 1;
        if line.trim().is_empty() {
            continue;
        }
        let fields = parse_csv_line(&line, options, line_no)?;

        if header.is_none() && options.has_header {
            header = Some(fields.into_iter().map(|f| f.text).collect());
            continue;
        }
        let expected = header
            .get_or_insert_with(|| (0..fields.len()).map(|i| format!("col{i}")).collect())
            .len();
        if fields.len() != expected {
            return Err(StorageError::Parse {
                line: line_no,
                message: format!("{} fields, expected {expected}", fields.len()),
            });
        }
        records.push(fields);
    }

    let names = header.unwrap_or_default();
    let types: Vec<DataType> = (0..names.len())
        .map(|c| infer_column_type(records.iter().map(|r| &r[c])))
        .collect();

    let rows: Vec<Tuple> = records
        .iter()
        .map(|r| {
            r.iter()
                .zip(&types)
                .map(|(field, ty)| parse_value(field, *ty))
                .collect()
        })
        .collect();

    let schema = Schema::new(names.into_iter().zip(types).collect());
    debug!(path = %path.display(), rows = rows.len(), %schema, "csv loaded");
    Ok(Batch::new(schema, rows))
}

/// Save a batch as CSV with default options
pub fn save_csv<P: AsRef<Path>>(path: P, batch: &Batch) -> StorageResult<()> {
    save_csv_with_options(path, batch, &CsvOptions::default())
}

/// Save a batch as CSV. String values that would read back as another type
/// are quoted so the column type survives a reload.
pub fn save_csv_with_options<P: AsRef<Path>>(
    path: P,
    batch: &Batch,
    options: &CsvOptions,
) -> StorageResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = BufWriter::new(File::create(path)?);
    let delimiter = options.delimiter.to_string();

    if options.has_header {
        let header = batch
            .schema()
            .names()
            .into_iter()
            .map(|s| escape_csv_field(s, options, false))
            .collect::<Vec<_>>()
            .join(&delimiter);
        writeln!(writer, "{header}")?;
    }

    for tuple in batch.rows() {
        let row = tuple
            .values()
            .iter()
            .map(|v| value_to_csv(v, options))
            .collect::<Vec<_>>()
            .join(&delimiter);
        writeln!(writer, "{row}")?;
    }

    writer.flush()?;
    Ok(())
}

/// Split one line into fields; doubled quote characters inside a quoted
/// field are an escaped quote
fn parse_csv_line(line: &str, options: &CsvOptions, line_no: usize) -> StorageResult<Vec<RawField>> {
    let quote = options.quote_char;
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    let finish = |current: &mut String, quoted: bool| {
        let text = std::mem::take(current);
        let text = if !quoted && options.trim_whitespace {
            text.trim().to_string()
        } else {
            text
        };
        RawField { text, quoted }
    };

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == quote {
                if chars.peek() == Some(&quote) {
                    chars.next();
                    current.push(quote);
                } else {
                    in_quotes = false;
                }
            } else {
                current.push(c);
            }
        } else if c == quote && current.trim().is_empty() {
            current.clear();
            in_quotes = true;
            quoted = true;
        } else if c == options.delimiter {
            fields.push(finish(&mut current, quoted));
            quoted = false;
        } else if !(quoted && c.is_whitespace()) {
            current.push(c);
        }
    }
    if in_quotes {
        return Err(StorageError::Parse {
            line: line_no,
            message: "unterminated quoted field".to_string(),
        });
    }
    fields.push(finish(&mut current, quoted));
    Ok(fields)
}

fn parse_bool(text: &str) -> Option<bool> {
    if text.eq_ignore_ascii_case("true") {
        Some(true)
    } else if text.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Narrowest type that every non-null field in the column parses as
fn infer_column_type<'a>(fields: impl Iterator<Item = &'a RawField>) -> DataType {
    let mut ty = DataType::Null;
    for field in fields {
        if !field.quoted && field.text.is_empty() {
            continue;
        }
        let this = if field.quoted {
            DataType::String
        } else if field.text.parse::<i64>().is_ok() {
            DataType::Int64
        } else if field.text.parse::<f64>().is_ok() {
            DataType::Float64
        } else if parse_bool(&field.text).is_some() {
            DataType::Bool
        } else {
            DataType::String
        };
        ty = ty.unify(this).unwrap_or(DataType::String);
        if ty == DataType::String {
            break;
        }
    }
    ty
}

fn parse_value(field: &RawField, ty: DataType) -> Value {
    if !field.quoted && field.text.is_empty() {
        return Value::Null;
    }
    let text = field.text.as_str();
    match ty {
        DataType::Int64 => text.parse().map_or(Value::Null, Value::Int64),
        DataType::Float64 => text.parse().map_or(Value::Null, Value::Float64),
        DataType::Bool => parse_bool(text).map_or(Value::Null, Value::Bool),
        DataType::String | DataType::Null => Value::string(text),
    }
}

fn escape_csv_field(text: &str, options: &CsvOptions, force: bool) -> String {
    let needs_quotes = force
        || text.contains(options.delimiter)
        || text.contains(options.quote_char)
        || text.contains('\n')
        || text.contains('\r')
        || text.trim() != text;
    if needs_quotes {
        let q = options.quote_char;
        let escaped = text.replace(q, &format!("{q}{q}"));
        format!("{q}{escaped}{q}")
    } else {
        text.to_string()
    }
}

fn value_to_csv(value: &Value, options: &CsvOptions) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Int64(i) => i.to_string(),
        // Debug keeps the decimal point so floats reload as floats
        Value::Float64(f) => format!("{f:?}"),
        Value::String(s) => {
            let ambiguous = s.is_empty()
                || s.parse::<f64>().is_ok()
                || parse_bool(s).is_some();
            escape_csv_field(s, options, ambiguous)
        }
    }
}
