//! Field state store.
//!
//! [`FieldStore`] is the single owner of the [`FieldValueMap`] for the active
//! schema. Every other component reads and writes values through its accessor
//! API; the only copies that leave the store are immutable snapshots.
//!
//! The store performs raw writes only. Link propagation and emission are
//! driven by the [`FieldEngine`](crate::engine::FieldEngine), which decides
//! when a write is user-driven and when it is a synchronizer resize.

use std::sync::Arc;

use tracing::debug;

use crate::schema::{default_row, FieldDefinition, FieldType, Schema};
use crate::types::{FieldValue, FieldValueMap, TableRow};

/// Value a field starts with when its schema is loaded.
///
/// Tables get `minRows` rows built from column defaults, checkboxes start
/// unchecked, and every other type starts as the empty string.
#[must_use]
pub fn default_value(field: &FieldDefinition) -> FieldValue {
    match field.field_type {
        FieldType::Table => {
            let columns = field.columns();
            FieldValue::Rows((0..field.min_rows()).map(|_| default_row(columns)).collect())
        }
        FieldType::Checkbox => FieldValue::Bool(false),
        _ => FieldValue::blank(),
    }
}

/// Owner of the field id -> value mapping for one schema.
#[derive(Debug, Clone)]
pub struct FieldStore {
    schema: Arc<Schema>,
    values: FieldValueMap,
}

impl FieldStore {
    /// Creates a store seeded with the defaults of `schema`.
    #[must_use]
    pub fn new(schema: Arc<Schema>) -> Self {
        let mut store = Self {
            schema: Arc::new(Schema::new(Vec::new())),
            values: FieldValueMap::new(),
        };
        store.initialize(schema);
        store
    }

    /// Replaces the whole map with the defaults of `schema`.
    ///
    /// Always a full replace: nothing from the previous schema survives,
    /// even for fields that share an id with the new one.
    pub fn initialize(&mut self, schema: Arc<Schema>) {
        self.values = schema
            .fields()
            .iter()
            .map(|field| (field.id.clone(), default_value(field)))
            .collect();
        self.schema = schema;
    }

    /// Schema the current values were seeded from.
    #[must_use]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    #[must_use]
    pub fn get(&self, field_id: &str) -> Option<&FieldValue> {
        self.values.get(field_id)
    }

    /// Read-only access to the full map.
    #[must_use]
    pub fn values(&self) -> &FieldValueMap {
        &self.values
    }

    /// Copies the map into an immutable shared snapshot.
    #[must_use]
    pub fn share(&self) -> Arc<FieldValueMap> {
        Arc::new(self.values.clone())
    }

    /// Overwrites a field. Returns `true` if the stored value changed.
    ///
    /// Writes to ids outside the schema are ignored so the map keeps exactly
    /// the schema's fields.
    pub fn set(&mut self, field_id: &str, value: FieldValue) -> bool {
        if !self.schema.contains(field_id) {
            debug!(field_id, "ignoring write to field outside the active schema");
            return false;
        }
        match self.values.get_mut(field_id) {
            Some(current) if *current == value => false,
            Some(current) => {
                *current = value;
                true
            }
            None => {
                self.values.insert(field_id.to_string(), value);
                true
            }
        }
    }

    /// Rows of a table field, or an empty slice when the field is absent or
    /// does not hold rows.
    #[must_use]
    pub fn table_rows(&self, field_id: &str) -> &[TableRow] {
        self.values
            .get(field_id)
            .and_then(FieldValue::as_rows)
            .unwrap_or_default()
    }

    /// Number of rows currently held by a table field.
    #[must_use]
    pub fn row_count(&self, field_id: &str) -> usize {
        self.table_rows(field_id).len()
    }

    /// Appends one row built from the table's column defaults.
    ///
    /// A table whose value is not a row list is reset to an empty list first.
    /// Returns the new row count, or `None` if `field_id` is not a table of
    /// the active schema.
    pub fn push_default_row(&mut self, field_id: &str) -> Option<usize> {
        let row = default_row(self.table_definition(field_id)?.columns());
        Some(self.with_rows(field_id, |rows| {
            rows.push(row);
            rows.len()
        }))
    }

    /// Removes the row at `index` and returns it.
    ///
    /// Returns `None` and leaves the table alone when the index is out of
    /// range or the field holds no rows.
    pub fn remove_row(&mut self, field_id: &str, index: usize) -> Option<TableRow> {
        match self.values.get_mut(field_id) {
            Some(FieldValue::Rows(rows)) if index < rows.len() => Some(rows.remove(index)),
            _ => None,
        }
    }

    /// Grows or truncates a table to exactly `target` rows.
    ///
    /// New rows come from column defaults; truncation drops rows from the end.
    /// Returns `true` if the row count changed.
    pub fn resize_rows(&mut self, field_id: &str, target: usize) -> bool {
        let Some(columns) = self
            .table_definition(field_id)
            .map(|field| field.columns().to_vec())
        else {
            return false;
        };
        self.with_rows(field_id, |rows| {
            let current = rows.len();
            if target < current {
                rows.truncate(target);
            } else {
                rows.extend((current..target).map(|_| default_row(&columns)));
            }
            current != target
        })
    }

    /// Replaces every value with `values`.
    ///
    /// Ids outside the schema are dropped and schema fields missing from
    /// `values` fall back to their defaults, so the map always carries
    /// exactly one entry per schema field.
    pub fn replace_all(&mut self, mut values: FieldValueMap) {
        let dropped = values
            .keys()
            .filter(|id| !self.schema.contains(id))
            .count();
        if dropped > 0 {
            debug!(dropped, "dropping loaded values outside the active schema");
        }
        self.values = self
            .schema
            .fields()
            .iter()
            .map(|field| {
                let value = values
                    .remove(&field.id)
                    .unwrap_or_else(|| default_value(field));
                (field.id.clone(), value)
            })
            .collect();
    }

    fn table_definition(&self, field_id: &str) -> Option<&FieldDefinition> {
        self.schema.field(field_id).filter(|field| field.is_table())
    }

    /// Runs `f` on the table's rows. A value that is not a row list is
    /// replaced by an empty list first.
    fn with_rows<R>(&mut self, field_id: &str, f: impl FnOnce(&mut Vec<TableRow>) -> R) -> R {
        let slot = self.values.entry(field_id.to_string()).or_default();
        let mut rows = match std::mem::take(slot) {
            FieldValue::Rows(rows) => rows,
            _ => Vec::new(),
        };
        let result = f(&mut rows);
        *slot = FieldValue::Rows(rows);
        result
    }
}

impl Default for FieldStore {
    fn default() -> Self {
        Self::new(Arc::new(Schema::new(Vec::new())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnType, TableColumnDefinition};
    use crate::types::CellValue;

    fn columns() -> Vec<TableColumnDefinition> {
        vec![
            TableColumnDefinition {
                id: "n".to_string(),
                label: "#".to_string(),
                column_type: ColumnType::AutoNumber,
                required: false,
                options: Vec::new(),
                default_value: None,
                date_range: None,
            },
            TableColumnDefinition {
                id: "monto".to_string(),
                label: "Monto".to_string(),
                column_type: ColumnType::Currency,
                required: true,
                options: Vec::new(),
                default_value: None,
                date_range: None,
            },
        ]
    }

    fn make_store() -> FieldStore {
        FieldStore::new(Arc::new(Schema::new(vec![
            FieldDefinition::new("nombre", "Nombre", FieldType::Text),
            FieldDefinition::new("acepta", "Acepta", FieldType::Checkbox),
            FieldDefinition::new("cuotas", "Cuotas", FieldType::Number),
            FieldDefinition::new("cronograma", "Cronograma", FieldType::Table)
                .with_columns(columns())
                .with_row_bounds(Some(2), None),
        ])))
    }

    #[test]
    fn initialize_seeds_type_defaults() {
        let store = make_store();
        assert_eq!(store.values().len(), 4);
        assert_eq!(store.get("nombre"), Some(&FieldValue::blank()));
        assert_eq!(store.get("acepta"), Some(&FieldValue::Bool(false)));
        assert_eq!(store.get("cuotas"), Some(&FieldValue::blank()));
        let rows = store.table_rows("cronograma");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["n"], CellValue::Null);
        assert_eq!(rows[0]["monto"], CellValue::Number(0.0));
    }

    #[test]
    fn initialize_discards_previous_values() {
        let mut store = make_store();
        store.set("nombre", FieldValue::text("Ana"));
        store.initialize(Arc::new(Schema::new(vec![FieldDefinition::new(
            "nombre",
            "Nombre",
            FieldType::Text,
        )])));
        assert_eq!(store.values().len(), 1);
        assert_eq!(store.get("nombre"), Some(&FieldValue::blank()));
    }

    #[test]
    fn set_reports_change_and_ignores_unknown_fields() {
        let mut store = make_store();
        assert!(store.set("nombre", FieldValue::text("Ana")));
        assert!(!store.set("nombre", FieldValue::text("Ana")));
        assert!(!store.set("desconocido", FieldValue::text("x")));
        assert!(store.get("desconocido").is_none());
    }

    #[test]
    fn table_rows_is_defensive() {
        let mut store = make_store();
        assert!(store.table_rows("missing").is_empty());
        assert!(store.table_rows("nombre").is_empty());
        store.set("cronograma", FieldValue::text("corrupt"));
        assert!(store.table_rows("cronograma").is_empty());
    }

    #[test]
    fn push_default_row_recovers_non_row_value() {
        let mut store = make_store();
        store.set("cronograma", FieldValue::Empty);
        assert_eq!(store.push_default_row("cronograma"), Some(1));
        assert_eq!(store.push_default_row("nombre"), None);
        assert_eq!(store.push_default_row("missing"), None);
    }

    #[test]
    fn resize_rows_recovers_non_row_value() {
        let mut store = make_store();
        store.set("cronograma", FieldValue::text("corrupt"));
        assert!(store.resize_rows("cronograma", 2));
        assert_eq!(store.row_count("cronograma"), 2);
        assert!(!store.resize_rows("cuotas", 2));
    }

    #[test]
    fn remove_row_out_of_range_is_noop() {
        let mut store = make_store();
        assert!(store.remove_row("cronograma", 5).is_none());
        assert!(store.remove_row("nombre", 0).is_none());
        assert_eq!(store.row_count("cronograma"), 2);
        assert!(store.remove_row("cronograma", 0).is_some());
        assert_eq!(store.row_count("cronograma"), 1);
    }

    #[test]
    fn resize_rows_grows_and_truncates() {
        let mut store = make_store();
        assert!(store.resize_rows("cronograma", 5));
        assert_eq!(store.row_count("cronograma"), 5);
        assert!(!store.resize_rows("cronograma", 5));
        assert!(store.resize_rows("cronograma", 1));
        assert_eq!(store.row_count("cronograma"), 1);
        assert!(!store.resize_rows("nombre", 3));
    }

    #[test]
    fn replace_all_backfills_and_drops() {
        let mut store = make_store();
        let mut loaded = FieldValueMap::new();
        loaded.insert("nombre".to_string(), FieldValue::text("Luis"));
        loaded.insert("extra".to_string(), FieldValue::Number(1.0));
        store.replace_all(loaded);

        assert_eq!(store.values().len(), 4);
        assert_eq!(store.get("nombre"), Some(&FieldValue::text("Luis")));
        assert_eq!(store.get("acepta"), Some(&FieldValue::Bool(false)));
        assert_eq!(store.row_count("cronograma"), 2);
        assert!(store.get("extra").is_none());
    }

    #[test]
    fn share_is_detached_from_later_writes() {
        let mut store = make_store();
        let snapshot = store.share();
        store.set("nombre", FieldValue::text("Ana"));
        assert_eq!(snapshot.get("nombre"), Some(&FieldValue::blank()));
    }
}
