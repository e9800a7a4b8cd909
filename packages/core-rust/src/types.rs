use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Scalar held in a single table cell.
///
/// Serializes untagged so a row reads as a plain JSON object
/// (`{"n": null, "monto": 0, "fecha": ""}`), matching what the case screens
/// exchange with the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    /// No value. Auto-number cells always hold this; the row index is the number.
    Null,
    /// Numeric cell (number and currency columns).
    Number(f64),
    /// Any textual cell (text, date, time, phone, select columns).
    Text(String),
}

impl CellValue {
    /// Returns `true` for `Null` and for blank text.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Number(_) => false,
            Self::Text(s) => s.is_empty(),
        }
    }

    /// Borrows the text of a `Text` cell.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl Default for CellValue {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

/// One table row: column id -> cell.
///
/// Uses `BTreeMap` for deterministic serialization order.
pub type TableRow = BTreeMap<String, CellValue>;

/// Value stored for one field of the form.
///
/// The variant in use is decided by the field's [`FieldType`](crate::schema::FieldType):
/// tables hold `Rows`, checkboxes hold `Bool`, numeric inputs usually hold
/// `Number`, and every other input holds `Text`. Nothing forces a caller to
/// respect that pairing; the engine stores whatever it is given so the form
/// stays renderable, and the readers below interpret values defensively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Checkbox state.
    Bool(bool),
    /// Number or currency input.
    Number(f64),
    /// Text-like input. The empty string is the default for most fields.
    Text(String),
    /// Table field rows, in display order.
    Rows(Vec<TableRow>),
    /// Explicitly cleared value (JSON `null`).
    Empty,
}

impl FieldValue {
    /// Shorthand for a text value.
    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// The empty-string value most fields start with.
    #[must_use]
    pub fn blank() -> Self {
        Self::Text(String::new())
    }

    /// Returns `true` when a required field holding this value counts as missing.
    ///
    /// `Empty` and blank text are missing. A `false` checkbox and a zero
    /// number are present. An empty row list is not missing here; the
    /// completeness check applies the row rule separately.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.is_empty(),
            Self::Bool(_) | Self::Number(_) | Self::Rows(_) => false,
        }
    }

    /// Returns the rows of a table value.
    #[must_use]
    pub fn as_rows(&self) -> Option<&[TableRow]> {
        match self {
            Self::Rows(rows) => Some(rows),
            _ => None,
        }
    }

    /// Reads the value as a finite number.
    ///
    /// `Number` is taken as is; `Text` is accepted when its trimmed content
    /// parses as a float, since numeric inputs may deliver their raw text.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        let n = match self {
            Self::Number(n) => *n,
            Self::Text(s) => s.trim().parse::<f64>().ok()?,
            _ => return None,
        };
        n.is_finite().then_some(n)
    }

    /// Row count a link source asks for: `floor(value)` when the value is a
    /// positive number, `None` otherwise.
    #[must_use]
    pub fn requested_row_count(&self) -> Option<usize> {
        let n = self.as_number()?;
        if n <= 0.0 {
            return None;
        }
        // Values past usize range saturate; callers cap the count.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let count = n.floor() as usize;
        Some(count)
    }

    /// Returns `true` when the value can be treated as an actual suggestion.
    ///
    /// NaN never compares equal to itself, so accepting it would make every
    /// merge of the same batch look like a change.
    #[must_use]
    pub fn is_defined(&self) -> bool {
        !matches!(self, Self::Number(n) if n.is_nan())
    }
}

impl Default for FieldValue {
    fn default() -> Self {
        Self::blank()
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<TableRow>> for FieldValue {
    fn from(rows: Vec<TableRow>) -> Self {
        Self::Rows(rows)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s:?}"),
            Self::Rows(rows) => write!(f, "[{} rows]", rows.len()),
            Self::Empty => f.write_str("null"),
        }
    }
}

/// Canonical field id -> value mapping for one form.
///
/// Uses `BTreeMap` for deterministic snapshot serialization.
pub type FieldValueMap = BTreeMap<String, FieldValue>;
