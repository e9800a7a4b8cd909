//! Schema model for classification-specific forms.
//!
//! A [`Schema`] is the immutable description of the fields one leaf
//! classification collects. It is pure data: nothing here mutates values.
//! The JSON shape matches the metadata schema stored per classification
//! (`{"fields": [...]}` with camelCase keys and lowercase type codes).

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::types::{CellValue, TableRow};

/// Input type of a top-level field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Number,
    Currency,
    Date,
    Datetime,
    Select,
    Textarea,
    Checkbox,
    Phone,
    Email,
    Url,
    Time,
    Table,
}

impl FieldType {
    /// Whether the field holds a number (and may therefore drive a table link).
    #[must_use]
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Number | Self::Currency)
    }

    /// Whether length and pattern constraints apply to the field's text.
    #[must_use]
    pub fn is_text_like(self) -> bool {
        matches!(
            self,
            Self::Text | Self::Textarea | Self::Phone | Self::Email | Self::Url
        )
    }
}

/// Input type of a table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColumnType {
    AutoNumber,
    Text,
    Number,
    Currency,
    Date,
    Time,
    Phone,
    Select,
}

/// One entry of a select list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

/// Input-level constraints rendered as field attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldConstraints {
    /// Inclusive lower bound for numeric fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Inclusive upper bound for numeric fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Minimum character count for text-like fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    /// Maximum character count for text-like fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    /// Regular expression the whole text must match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

/// Inclusive ISO-8601 date window for a date column.
///
/// Dates are compared as `YYYY-MM-DD` strings, which order chronologically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<String>,
}

impl DateRange {
    /// Returns `true` if `date` falls inside the window.
    #[must_use]
    pub fn contains(&self, date: &str) -> bool {
        self.min.as_deref().map_or(true, |min| date >= min)
            && self.max.as_deref().map_or(true, |max| date <= max)
    }
}

/// Column of a table field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableColumnDefinition {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<SelectOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<CellValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
}

impl TableColumnDefinition {
    /// Cell a freshly added row gets for this column.
    ///
    /// Auto-number cells stay null; numeric columns fall back to `0`;
    /// everything else falls back to the empty string. A blank default
    /// counts as absent.
    #[must_use]
    pub fn default_cell(&self) -> CellValue {
        let explicit = self.default_value.as_ref().filter(|v| !v.is_empty());
        match self.column_type {
            ColumnType::AutoNumber => CellValue::Null,
            ColumnType::Number | ColumnType::Currency => {
                explicit.cloned().unwrap_or(CellValue::Number(0.0))
            }
            _ => explicit.cloned().unwrap_or_default(),
        }
    }
}

/// Builds a new row from column defaults.
#[must_use]
pub fn default_row(columns: &[TableColumnDefinition]) -> TableRow {
    columns
        .iter()
        .map(|column| (column.id.clone(), column.default_cell()))
        .collect()
}

/// One field of a classification form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(flatten)]
    pub constraints: FieldConstraints,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<SelectOption>,
    /// Table columns. `None` on a table is tolerated and read as no columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<TableColumnDefinition>>,
    /// Numeric field whose value mirrors this table's row count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_field_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_rows: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_rows: Option<usize>,
    #[serde(default)]
    pub allow_add_row: bool,
    #[serde(default)]
    pub allow_delete_row: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
    #[serde(default)]
    pub display_order: i32,
}

impl FieldDefinition {
    /// Creates a field with no constraints, options or table settings.
    #[must_use]
    pub fn new(id: impl Into<String>, label: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            field_type,
            required: false,
            constraints: FieldConstraints::default(),
            options: Vec::new(),
            columns: None,
            linked_field_id: None,
            min_rows: None,
            max_rows: None,
            allow_add_row: field_type == FieldType::Table,
            allow_delete_row: field_type == FieldType::Table,
            placeholder: None,
            help_text: None,
            display_order: 0,
        }
    }

    /// Marks the field as required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets the table columns.
    #[must_use]
    pub fn with_columns(mut self, columns: Vec<TableColumnDefinition>) -> Self {
        self.columns = Some(columns);
        self
    }

    /// Links this table's row count to a numeric field.
    #[must_use]
    pub fn linked_to(mut self, field_id: impl Into<String>) -> Self {
        self.linked_field_id = Some(field_id.into());
        self
    }

    /// Sets the table row bounds.
    #[must_use]
    pub fn with_row_bounds(mut self, min_rows: Option<usize>, max_rows: Option<usize>) -> Self {
        self.min_rows = min_rows;
        self.max_rows = max_rows;
        self
    }

    #[must_use]
    pub fn is_table(&self) -> bool {
        self.field_type == FieldType::Table
    }

    /// Table columns, empty when none were declared.
    #[must_use]
    pub fn columns(&self) -> &[TableColumnDefinition] {
        self.columns.as_deref().unwrap_or_default()
    }

    #[must_use]
    pub fn min_rows(&self) -> usize {
        self.min_rows.unwrap_or(0)
    }

    /// Clamps a requested row count into `[minRows, maxRows]`.
    ///
    /// When the bounds themselves conflict (`minRows > maxRows`) the minimum wins.
    #[must_use]
    pub fn clamp_rows(&self, requested: usize) -> usize {
        let capped = self.max_rows.map_or(requested, |max| requested.min(max));
        capped.max(self.min_rows())
    }
}

/// Authoring problem found by [`Schema::issues`].
///
/// None of these stop a schema from loading; the engine treats each as a
/// warning and keeps going with the most forgiving reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaIssue {
    /// A later field reused an id; only the first definition is kept.
    DuplicateFieldId { field_id: String },
    /// A table declared no columns; rows will be empty objects.
    TableWithoutColumns { field_id: String },
    /// `linkedFieldId` set on something that is not a table.
    LinkOnNonTable { field_id: String },
    /// Link target does not exist in the schema.
    MissingLinkTarget { field_id: String, target: String },
    /// Link target is not a number or currency field.
    NonNumericLinkTarget { field_id: String, target: String },
    /// Two or more tables follow the same numeric field.
    SharedLinkTarget { target: String, tables: Vec<String> },
    /// `minRows` exceeds `maxRows`.
    ConflictingRowBounds { field_id: String, min_rows: usize, max_rows: usize },
    /// A `pattern` constraint failed to compile.
    InvalidPattern { field_id: String, pattern: String },
}

impl fmt::Display for SchemaIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateFieldId { field_id } => {
                write!(f, "duplicate field id '{field_id}', keeping the first definition")
            }
            Self::TableWithoutColumns { field_id } => {
                write!(f, "table '{field_id}' declares no columns")
            }
            Self::LinkOnNonTable { field_id } => {
                write!(f, "field '{field_id}' has a link but is not a table")
            }
            Self::MissingLinkTarget { field_id, target } => {
                write!(f, "table '{field_id}' links to unknown field '{target}'")
            }
            Self::NonNumericLinkTarget { field_id, target } => {
                write!(f, "table '{field_id}' links to non-numeric field '{target}'")
            }
            Self::SharedLinkTarget { target, tables } => {
                write!(f, "field '{target}' is linked by several tables: {}", tables.join(", "))
            }
            Self::ConflictingRowBounds { field_id, min_rows, max_rows } => {
                write!(f, "table '{field_id}' has minRows {min_rows} > maxRows {max_rows}")
            }
            Self::InvalidPattern { field_id, pattern } => {
                write!(f, "field '{field_id}' has an invalid pattern {pattern:?}")
            }
        }
    }
}

/// Ordered set of field definitions with unique ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawSchema")]
pub struct Schema {
    fields: Vec<FieldDefinition>,
    #[serde(skip)]
    duplicates: Vec<String>,
}

#[derive(Deserialize)]
struct RawSchema {
    #[serde(default)]
    fields: Vec<FieldDefinition>,
}

impl From<RawSchema> for Schema {
    fn from(raw: RawSchema) -> Self {
        Self::new(raw.fields)
    }
}

impl Schema {
    /// Builds a schema, dropping any field whose id was already used.
    #[must_use]
    pub fn new(fields: Vec<FieldDefinition>) -> Self {
        let mut seen = HashSet::new();
        let mut duplicates = Vec::new();
        let mut unique = Vec::with_capacity(fields.len());
        for field in fields {
            if seen.insert(field.id.clone()) {
                unique.push(field);
            } else {
                duplicates.push(field.id);
            }
        }
        Self {
            fields: unique,
            duplicates,
        }
    }

    /// Parses the JSON metadata schema of a classification.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid schema document.
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        serde_json::from_str(text).context("invalid field schema document")
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    #[must_use]
    pub fn field(&self, id: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.id == id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.field(id).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Tables whose row count follows `source_id`, in schema order.
    pub fn tables_linked_to<'a>(
        &'a self,
        source_id: &'a str,
    ) -> impl Iterator<Item = &'a FieldDefinition> + 'a {
        self.fields
            .iter()
            .filter(move |f| f.is_table() && f.linked_field_id.as_deref() == Some(source_id))
    }

    /// Lists authoring problems. An empty list means the schema is clean.
    #[must_use]
    pub fn issues(&self) -> Vec<SchemaIssue> {
        let mut issues: Vec<SchemaIssue> = self
            .duplicates
            .iter()
            .map(|id| SchemaIssue::DuplicateFieldId {
                field_id: id.clone(),
            })
            .collect();
        let mut link_targets: BTreeMap<&str, Vec<String>> = BTreeMap::new();

        for field in &self.fields {
            if let Some(pattern) = &field.constraints.pattern {
                if regex::Regex::new(pattern).is_err() {
                    issues.push(SchemaIssue::InvalidPattern {
                        field_id: field.id.clone(),
                        pattern: pattern.clone(),
                    });
                }
            }

            if !field.is_table() {
                if field.linked_field_id.is_some() {
                    issues.push(SchemaIssue::LinkOnNonTable {
                        field_id: field.id.clone(),
                    });
                }
                continue;
            }

            if field.columns().is_empty() {
                issues.push(SchemaIssue::TableWithoutColumns {
                    field_id: field.id.clone(),
                });
            }
            if let (Some(min_rows), Some(max_rows)) = (field.min_rows, field.max_rows) {
                if min_rows > max_rows {
                    issues.push(SchemaIssue::ConflictingRowBounds {
                        field_id: field.id.clone(),
                        min_rows,
                        max_rows,
                    });
                }
            }

            let Some(target) = field.linked_field_id.as_deref() else {
                continue;
            };
            match self.field(target) {
                None => issues.push(SchemaIssue::MissingLinkTarget {
                    field_id: field.id.clone(),
                    target: target.to_string(),
                }),
                Some(t) if !t.field_type.is_numeric() => {
                    issues.push(SchemaIssue::NonNumericLinkTarget {
                        field_id: field.id.clone(),
                        target: target.to_string(),
                    });
                }
                Some(_) => {}
            }
            link_targets
                .entry(target)
                .or_default()
                .push(field.id.clone());
        }

        issues.extend(
            link_targets
                .into_iter()
                .filter(|(_, tables)| tables.len() > 1)
                .map(|(target, tables)| SchemaIssue::SharedLinkTarget {
                    target: target.to_string(),
                    tables,
                }),
        );
        issues
    }
}
