//! Minimal CSV table codec
//!
//! Comma-separated, `"`-quoted fields with doubled quotes for escapes
//! (RFC 4180). The first record is the header.

use crate::error::{DataError, DataResult};
use serde::Serialize;
use std::borrow::Cow;

/// A header row and data rows of string cells
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<S: Into<String>>(headers: impl IntoIterator<Item = S>) -> Self {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    /// Keep at most the first `max_rows` rows
    pub fn truncate(&mut self, max_rows: usize) {
        self.rows.truncate(max_rows);
    }

    /// Index of a header
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Encode as CSV text
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        write_record(&mut out, &self.headers);
        for row in &self.rows {
            write_record(&mut out, row);
        }
        out
    }

    /// Parse CSV text; every row must have as many cells as the header
    pub fn parse(text: &str) -> DataResult<Self> {
        let mut records = parse_records(text)?.into_iter();
        let Some((_, headers)) = records.next() else {
            return Err(DataError::csv(1, "missing header row"));
        };

        let mut rows = Vec::new();
        for (line, row) in records {
            if row.len() != headers.len() {
                return Err(DataError::csv(
                    line,
                    format!("expected {} fields, found {}", headers.len(), row.len()),
                ));
            }
            rows.push(row);
        }
        Ok(Self { headers, rows })
    }
}

/// Quote a field when it contains a delimiter, quote or line break
pub fn escape(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

fn write_record(out: &mut String, fields: &[String]) {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&escape(field));
    }
    out.push('\n');
}

/// Split text into records, each tagged with the line it starts on
fn parse_records(text: &str) -> DataResult<Vec<(usize, Vec<String>)>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut quoted = false;
    let mut line = 1;
    let mut record_line = 1;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.push(c);
                }
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' if field.is_empty() && !quoted => {
                in_quotes = true;
                quoted = true;
            }
            '"' => return Err(DataError::csv(line, "unexpected quote in unquoted field")),
            ',' => {
                record.push(std::mem::take(&mut field));
                quoted = false;
            }
            '\r' => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                quoted = false;
                // Blank lines carry no record
                if !(record.len() == 1 && record[0].is_empty()) {
                    records.push((record_line, std::mem::take(&mut record)));
                }
                record.clear();
                line += 1;
                record_line = line;
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(DataError::csv(line, "unterminated quoted field"));
    }
    if !field.is_empty() || !record.is_empty() || quoted {
        record.push(field);
        records.push((record_line, record));
    }
    Ok(records)
}
