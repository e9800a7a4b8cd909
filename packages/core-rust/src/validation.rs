//! Input-level constraint checks.
//!
//! Reports values that break the constraints a field renders as input
//! attributes (bounds, lengths, patterns, select options) and the per-cell
//! rules of table columns. Violations are only reported: the store keeps
//! whatever was written, and empty optional values are never flagged.

use std::fmt;

use regex::Regex;

use crate::schema::{
    ColumnType, FieldDefinition, FieldType, Schema, SelectOption, TableColumnDefinition,
};
use crate::types::{CellValue, FieldValue, FieldValueMap, TableRow};

/// One constraint violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field_id: String,
    /// Zero-based row, for table cell violations.
    pub row: Option<usize>,
    /// Column id, for table cell violations.
    pub column: Option<String>,
    pub message: String,
}

impl ValidationError {
    fn field(field: &FieldDefinition, message: String) -> Self {
        Self {
            field_id: field.id.clone(),
            row: None,
            column: None,
            message,
        }
    }

    fn cell(
        field: &FieldDefinition,
        row: usize,
        column: &TableColumnDefinition,
        message: String,
    ) -> Self {
        Self {
            field_id: field.id.clone(),
            row: Some(row),
            column: Some(column.id.clone()),
            message,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.row, &self.column) {
            (Some(row), Some(column)) => {
                write!(f, "{}[{}].{}: {}", self.field_id, row + 1, column, self.message)
            }
            _ => write!(f, "{}: {}", self.field_id, self.message),
        }
    }
}

/// Result of validating a value map against a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// Every value conforms to its constraints.
    Valid,
    /// One or more values violate constraints.
    Invalid {
        /// Each violation, in schema order.
        errors: Vec<ValidationError>,
    },
}

impl ValidationResult {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// Violations found, empty when valid.
    #[must_use]
    pub fn errors(&self) -> &[ValidationError] {
        match self {
            Self::Valid => &[],
            Self::Invalid { errors } => errors,
        }
    }
}

/// Checks every field of `schema` against its constraints.
#[must_use]
pub fn validate(schema: &Schema, values: &FieldValueMap) -> ValidationResult {
    let mut errors = Vec::new();
    for field in schema.fields() {
        let Some(value) = values.get(&field.id) else {
            continue;
        };
        if field.is_table() {
            check_table(field, value, &mut errors);
        } else if !value.is_empty() {
            check_scalar(field, value, &mut errors);
        }
    }

    if errors.is_empty() {
        ValidationResult::Valid
    } else {
        ValidationResult::Invalid { errors }
    }
}

fn check_scalar(field: &FieldDefinition, value: &FieldValue, errors: &mut Vec<ValidationError>) {
    let constraints = &field.constraints;

    if field.field_type.is_numeric() {
        let Some(n) = value.as_number() else {
            errors.push(ValidationError::field(field, "must be a number".to_string()));
            return;
        };
        if let Some(min) = constraints.min.filter(|min| n < *min) {
            errors.push(ValidationError::field(field, format!("must be at least {min}")));
        }
        if let Some(max) = constraints.max.filter(|max| n > *max) {
            errors.push(ValidationError::field(field, format!("must be at most {max}")));
        }
        return;
    }

    if field.field_type == FieldType::Select {
        if let Some(text) = text_of(value) {
            if !option_allowed(&field.options, text) {
                errors.push(ValidationError::field(
                    field,
                    format!("{text:?} is not an available option"),
                ));
            }
        }
        return;
    }

    if !field.field_type.is_text_like() {
        return;
    }
    let Some(text) = text_of(value) else {
        return;
    };
    let length = text.chars().count();
    if let Some(min_length) = constraints.min_length.filter(|min| length < *min) {
        errors.push(ValidationError::field(
            field,
            format!("must have at least {min_length} characters"),
        ));
    }
    if let Some(max_length) = constraints.max_length.filter(|max| length > *max) {
        errors.push(ValidationError::field(
            field,
            format!("must have at most {max_length} characters"),
        ));
    }
    if let Some(pattern) = &constraints.pattern {
        // An uncompilable pattern is a schema issue, reported by `Schema::issues`.
        if let Ok(re) = Regex::new(&format!("^(?:{pattern})$")) {
            if !re.is_match(text) {
                errors.push(ValidationError::field(
                    field,
                    "does not match the expected format".to_string(),
                ));
            }
        }
    }
}

fn check_table(field: &FieldDefinition, value: &FieldValue, errors: &mut Vec<ValidationError>) {
    let rows = value.as_rows().unwrap_or_default();
    if rows.len() < field.min_rows() {
        errors.push(ValidationError::field(
            field,
            format!("needs at least {} rows", field.min_rows()),
        ));
    }
    if let Some(max_rows) = field.max_rows.filter(|max| rows.len() > *max) {
        errors.push(ValidationError::field(field, format!("allows at most {max_rows} rows")));
    }
    for (index, row) in rows.iter().enumerate() {
        for column in field.columns() {
            check_cell(field, index, column, row, errors);
        }
    }
}

fn check_cell(
    field: &FieldDefinition,
    index: usize,
    column: &TableColumnDefinition,
    row: &TableRow,
    errors: &mut Vec<ValidationError>,
) {
    if column.column_type == ColumnType::AutoNumber {
        return;
    }
    let cell = row.get(&column.id).unwrap_or(&CellValue::Null);
    if cell.is_empty() {
        if column.required {
            errors.push(ValidationError::cell(field, index, column, "is required".to_string()));
        }
        return;
    }
    match column.column_type {
        ColumnType::Number | ColumnType::Currency => {
            let numeric = match cell {
                CellValue::Number(_) => true,
                CellValue::Text(s) => s.trim().parse::<f64>().is_ok(),
                CellValue::Null => false,
            };
            if !numeric {
                errors.push(ValidationError::cell(
                    field,
                    index,
                    column,
                    "must be a number".to_string(),
                ));
            }
        }
        ColumnType::Select => {
            if let Some(text) = cell.as_text() {
                if !option_allowed(&column.options, text) {
                    errors.push(ValidationError::cell(
                        field,
                        index,
                        column,
                        format!("{text:?} is not an available option"),
                    ));
                }
            }
        }
        ColumnType::Date => {
            if let (Some(range), Some(date)) = (&column.date_range, cell.as_text()) {
                if !range.contains(date) {
                    errors.push(ValidationError::cell(
                        field,
                        index,
                        column,
                        "date is out of range".to_string(),
                    ));
                }
            }
        }
        _ => {}
    }
}

fn text_of(value: &FieldValue) -> Option<&str> {
    match value {
        FieldValue::Text(s) => Some(s),
        _ => None,
    }
}

/// An empty option list accepts anything.
fn option_allowed(options: &[SelectOption], value: &str) -> bool {
    options.is_empty() || options.iter().any(|o| o.value == value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DateRange;

    fn option(value: &str) -> SelectOption {
        SelectOption {
            value: value.to_string(),
            label: value.to_string(),
        }
    }

    fn column(id: &str, column_type: ColumnType) -> TableColumnDefinition {
        TableColumnDefinition {
            id: id.to_string(),
            label: id.to_string(),
            column_type,
            required: false,
            options: Vec::new(),
            default_value: None,
            date_range: None,
        }
    }

    fn schema() -> Schema {
        let mut monto = FieldDefinition::new("monto", "Monto", FieldType::Currency);
        monto.constraints.min = Some(1.0);
        monto.constraints.max = Some(5000.0);

        let mut dni = FieldDefinition::new("dni", "DNI", FieldType::Text);
        dni.constraints.pattern = Some("[0-9]{8}".to_string());
        dni.constraints.min_length = Some(8);

        let mut motivo = FieldDefinition::new("motivo", "Motivo", FieldType::Select);
        motivo.options = vec![option("VIAJE"), option("DESEMPLEO")];

        let mut importe = column("importe", ColumnType::Currency);
        importe.required = true;
        let mut fecha = column("fecha", ColumnType::Date);
        fecha.date_range = Some(DateRange {
            min: Some("2024-01-01".to_string()),
            max: None,
        });
        let mut estado = column("estado", ColumnType::Select);
        estado.options = vec![option("PENDIENTE"), option("PAGADO")];

        Schema::new(vec![
            monto,
            dni,
            motivo,
            FieldDefinition::new("cronograma", "Cronograma", FieldType::Table)
                .with_columns(vec![column("n", ColumnType::AutoNumber), importe, fecha, estado])
                .with_row_bounds(Some(1), Some(3)),
        ])
    }

    fn row(importe: CellValue, fecha: &str, estado: &str) -> TableRow {
        TableRow::from([
            ("n".to_string(), CellValue::Null),
            ("importe".to_string(), importe),
            ("fecha".to_string(), CellValue::Text(fecha.to_string())),
            ("estado".to_string(), CellValue::Text(estado.to_string())),
        ])
    }

    fn valid_values() -> FieldValueMap {
        FieldValueMap::from([
            ("monto".to_string(), FieldValue::Number(250.0)),
            ("dni".to_string(), FieldValue::text("12345678")),
            ("motivo".to_string(), FieldValue::text("VIAJE")),
            (
                "cronograma".to_string(),
                FieldValue::Rows(vec![row(CellValue::Number(250.0), "2024-03-01", "PENDIENTE")]),
            ),
        ])
    }

    #[test]
    fn conforming_values_are_valid() {
        assert_eq!(validate(&schema(), &valid_values()), ValidationResult::Valid);
    }

    #[test]
    fn empty_optional_values_are_not_flagged() {
        let values = FieldValueMap::from([
            ("monto".to_string(), FieldValue::blank()),
            ("dni".to_string(), FieldValue::Empty),
            ("motivo".to_string(), FieldValue::blank()),
            (
                "cronograma".to_string(),
                FieldValue::Rows(vec![row(CellValue::Number(1.0), "", "")]),
            ),
        ]);
        assert!(validate(&schema(), &values).is_valid());
    }

    #[test]
    fn numeric_bounds_are_checked() {
        let mut values = valid_values();
        values.insert("monto".to_string(), FieldValue::Number(0.5));
        let result = validate(&schema(), &values);
        assert_eq!(result.errors().len(), 1);
        assert_eq!(result.errors()[0].to_string(), "monto: must be at least 1");

        values.insert("monto".to_string(), FieldValue::text("mucho"));
        assert_eq!(validate(&schema(), &values).errors()[0].message, "must be a number");
    }

    #[test]
    fn pattern_must_match_the_whole_text() {
        let mut values = valid_values();
        values.insert("dni".to_string(), FieldValue::text("123456789"));
        let result = validate(&schema(), &values);
        assert_eq!(result.errors().len(), 1);
        assert_eq!(result.errors()[0].message, "does not match the expected format");

        values.insert("dni".to_string(), FieldValue::text("1234"));
        // Too short and not matching.
        assert_eq!(validate(&schema(), &values).errors().len(), 2);
    }

    #[test]
    fn select_value_must_be_an_option() {
        let mut values = valid_values();
        values.insert("motivo".to_string(), FieldValue::text("OTRO"));
        assert_eq!(
            validate(&schema(), &values).errors()[0].message,
            "\"OTRO\" is not an available option"
        );
    }

    #[test]
    fn table_cells_and_bounds_are_checked() {
        let mut values = valid_values();
        values.insert(
            "cronograma".to_string(),
            FieldValue::Rows(vec![
                row(CellValue::Null, "2023-12-01", "PENDIENTE"),
                row(CellValue::Text("x".to_string()), "2024-02-01", "ANULADO"),
                row(CellValue::Number(1.0), "2024-02-01", "PAGADO"),
                row(CellValue::Number(1.0), "2024-02-01", "PAGADO"),
            ]),
        );
        let result = validate(&schema(), &values);
        let rendered: Vec<String> = result.errors().iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec![
                "cronograma: allows at most 3 rows".to_string(),
                "cronograma[1].importe: is required".to_string(),
                "cronograma[1].fecha: date is out of range".to_string(),
                "cronograma[2].importe: must be a number".to_string(),
                "cronograma[2].estado: \"ANULADO\" is not an available option".to_string(),
            ]
        );
    }

    #[test]
    fn too_few_rows_is_reported() {
        let mut values = valid_values();
        values.insert("cronograma".to_string(), FieldValue::Rows(Vec::new()));
        assert_eq!(
            validate(&schema(), &values).errors()[0].message,
            "needs at least 1 rows"
        );
    }
}
