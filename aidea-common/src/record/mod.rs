//! Declarative record-to-column mapping
//!
//! Each persisted record type declares its column table once, in field
//! declaration order. That table is the positional contract of a day-file:
//! the header row and every encoded row are produced from it.
//!
//! # Usage
//!
//! ```rust,ignore
//! impl Record for Rule {
//!     const COLUMNS: &'static [Column] = &[
//!         Column::text("Id"),
//!         Column::text("Project"),
//!         // ...
//!     ];
//!     const ID_COLUMN: &'static str = "Id";
//!     // field / set_field map column names to struct fields
//! }
//!
//! let headers = columns::<Rule>();
//! let row = encode(&rule);
//! let decoded = decode::<Rule, _>(&row, &HeaderIndex::new(&headers));
//! ```

mod codec;

pub use codec::{
    columns, decode, decode_value, encode, encode_for_headers, encode_value, Decoded, HeaderIndex,
};

use chrono::NaiveDateTime;

/// Storage kind of a column, selects the encoding rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Encoded verbatim
    Text,
    /// Fixed-point, 6 decimal places
    Float,
    /// Literal `true` / `false`
    Bool,
    /// `YYYY-MM-DD HH:MM:SS`
    Timestamp,
}

/// One declared column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    /// Header name written to the file
    pub name: &'static str,
    /// Value kind
    pub kind: FieldKind,
}

impl Column {
    pub const fn text(name: &'static str) -> Self {
        Self { name, kind: FieldKind::Text }
    }

    pub const fn float(name: &'static str) -> Self {
        Self { name, kind: FieldKind::Float }
    }

    pub const fn bool(name: &'static str) -> Self {
        Self { name, kind: FieldKind::Bool }
    }

    pub const fn timestamp(name: &'static str) -> Self {
        Self { name, kind: FieldKind::Timestamp }
    }
}

/// Typed value of a single field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Float(f64),
    Bool(bool),
    Timestamp(NaiveDateTime),
}

impl FieldValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Text(_) => FieldKind::Text,
            FieldValue::Float(_) => FieldKind::Float,
            FieldValue::Bool(_) => FieldKind::Bool,
            FieldValue::Timestamp(_) => FieldKind::Timestamp,
        }
    }
}

/// A flat record persisted through the column table
pub trait Record: Default {
    /// Columns in declaration order
    const COLUMNS: &'static [Column];

    /// Column holding the unique record identifier
    const ID_COLUMN: &'static str;

    /// Unique identifier of this record
    fn record_id(&self) -> &str;

    /// Read the field behind `column`; `None` for an undeclared column
    fn field(&self, column: &str) -> Option<FieldValue>;

    /// Write the field behind `column`.
    ///
    /// Returns false if the column is undeclared or the value kind does not
    /// match the field.
    fn set_field(&mut self, column: &str, value: FieldValue) -> bool;
}
