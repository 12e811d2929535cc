//! Column table encoding and decoding

use std::collections::HashMap;

use tracing::warn;

use super::{Column, FieldKind, FieldValue, Record};
use crate::time;

/// Ordered header names of `R`
pub fn columns<R: Record>() -> Vec<&'static str> {
    R::COLUMNS.iter().map(|c| c.name).collect()
}

/// Encode one value per the day-file rules
pub fn encode_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Text(s) => s.clone(),
        FieldValue::Float(f) => format!("{:.6}", f),
        FieldValue::Bool(b) => b.to_string(),
        FieldValue::Timestamp(ts) => time::format_simple(ts),
    }
}

/// Decode one raw cell into a value of `kind`
pub fn decode_value(kind: FieldKind, raw: &str) -> Option<FieldValue> {
    match kind {
        FieldKind::Text => Some(FieldValue::Text(raw.to_string())),
        FieldKind::Float => raw.trim().parse::<f64>().ok().map(FieldValue::Float),
        FieldKind::Bool => parse_bool(raw).map(FieldValue::Bool),
        FieldKind::Timestamp => time::parse_timestamp(raw).map(FieldValue::Timestamp),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "1" => Some(true),
        "false" | "f" | "0" => Some(false),
        _ => None,
    }
}

/// Encode a record into cells, in column order
///
/// A column the record fails to report encodes as an empty cell, keeping
/// the row aligned with the header.
pub fn encode<R: Record>(record: &R) -> Vec<String> {
    R::COLUMNS
        .iter()
        .map(|column| {
            record
                .field(column.name)
                .map(|v| encode_value(&v))
                .unwrap_or_default()
        })
        .collect()
}

/// Encode a record in the column order of an existing file
///
/// Used when a day-file was written with an older column table: cells
/// follow `headers`, and headers `R` does not declare encode as empty.
pub fn encode_for_headers<R: Record, S: AsRef<str>>(record: &R, headers: &[S]) -> Vec<String> {
    headers
        .iter()
        .map(|header| {
            let header = normalize(header.as_ref());
            R::COLUMNS
                .iter()
                .find(|c| c.name.eq_ignore_ascii_case(&header))
                .and_then(|c| record.field(c.name))
                .map(|v| encode_value(&v))
                .unwrap_or_default()
        })
        .collect()
}

/// Header name to position lookup, case-insensitive
#[derive(Debug, Clone, Default)]
pub struct HeaderIndex {
    positions: HashMap<String, usize>,
}

impl HeaderIndex {
    pub fn new<S: AsRef<str>>(headers: &[S]) -> Self {
        let mut positions = HashMap::with_capacity(headers.len());
        for (i, header) in headers.iter().enumerate() {
            // First occurrence wins on duplicate headers
            positions
                .entry(normalize(header.as_ref()))
                .or_insert(i);
        }
        Self { positions }
    }

    /// Identity mapping for headerless rows laid out in `R`'s column order
    pub fn positional<R: Record>() -> Self {
        Self::new(&columns::<R>())
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(&normalize(name)).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

fn normalize(name: &str) -> String {
    name.trim().trim_start_matches('\u{feff}').to_ascii_lowercase()
}

/// Result of decoding one row
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<R> {
    pub record: R,
    /// True if any column was missing or failed to parse
    pub partial: bool,
}

/// Decode a row against `headers`
///
/// A column that is absent, out of range, or unparseable is left at its
/// default value and marks the result partial; it never fails the row.
pub fn decode<R: Record, S: AsRef<str>>(row: &[S], headers: &HeaderIndex) -> Decoded<R> {
    let mut record = R::default();
    let mut partial = false;

    for column in R::COLUMNS {
        let Some(raw) = headers
            .position(column.name)
            .and_then(|i| row.get(i))
            .map(|cell| cell.as_ref())
        else {
            partial = true;
            continue;
        };

        if !decode_into(&mut record, column, raw) {
            partial = true;
        }
    }

    Decoded { record, partial }
}

fn decode_into<R: Record>(record: &mut R, column: &Column, raw: &str) -> bool {
    match decode_value(column.kind, raw) {
        Some(value) => record.set_field(column.name, value),
        None => {
            warn!(
                column = column.name,
                value = raw,
                "Unable to parse {:?} field, leaving default",
                column.kind
            );
            false
        }
    }
}
