//! Save-readiness of a form.
//!
//! Pure predicates over a schema and a value map; nothing here mutates.

use std::fmt;

use crate::schema::{FieldDefinition, Schema};
use crate::types::{FieldValue, FieldValueMap};

/// Why a required field blocks saving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissingReason {
    /// No value, or blank text.
    Empty,
    /// A required table holds no rows.
    NoRows,
}

/// A required field that is not yet filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingField {
    pub field_id: String,
    pub label: String,
    pub reason: MissingReason,
}

impl fmt::Display for MissingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason {
            MissingReason::Empty => write!(f, "{} is required", self.label),
            MissingReason::NoRows => write!(f, "{} must have at least one row", self.label),
        }
    }
}

fn missing_reason(field: &FieldDefinition, value: Option<&FieldValue>) -> Option<MissingReason> {
    if !field.required {
        return None;
    }
    let Some(value) = value.filter(|v| !v.is_empty()) else {
        return Some(MissingReason::Empty);
    };
    if field.is_table() && value.as_rows().map_or(true, <[_]>::is_empty) {
        return Some(MissingReason::NoRows);
    }
    None
}

/// Returns `true` iff every required field has a non-empty value and every
/// required table has at least one row.
#[must_use]
pub fn is_complete(schema: &Schema, values: &FieldValueMap) -> bool {
    schema
        .fields()
        .iter()
        .all(|field| missing_reason(field, values.get(&field.id)).is_none())
}

/// Lists the required fields that block saving, in schema order.
#[must_use]
pub fn missing_required(schema: &Schema, values: &FieldValueMap) -> Vec<MissingField> {
    schema
        .fields()
        .iter()
        .filter_map(|field| {
            missing_reason(field, values.get(&field.id)).map(|reason| MissingField {
                field_id: field.id.clone(),
                label: field.label.clone(),
                reason,
            })
        })
        .collect()
}
