//! Field engine: one explicit propagation pass per stimulus.
//!
//! [`FieldEngine`] owns the [`FieldStore`] and runs every stimulus to its
//! settle point inside a single `&mut self` call:
//!
//! 1. seed defaults (schema swap) or apply the direct write;
//! 2. forward sync for edited link sources, or backward sync after a user
//!    row operation (never both for the same stimulus);
//! 3. merge external suggestions, each applied link source resized on the way;
//! 4. recompute completeness and emit exactly one snapshot.
//!
//! Because stimuli are `&mut self` calls, two of them can never interleave.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, debug_span, warn};

use crate::completeness::{self, MissingField};
use crate::config::EngineConfig;
use crate::context::ClassificationContext;
use crate::emit::{FieldSnapshot, Stimulus};
use crate::error::RowOperationError;
use crate::merge::{self, MergeOutcome, UpdateBatch};
use crate::schema::Schema;
use crate::store::FieldStore;
use crate::sync;
use crate::traits::{NoopObserver, SnapshotObserver};
use crate::types::{FieldValue, FieldValueMap, TableRow};
use crate::validation::{self, ValidationResult};

/// Reactive state machine behind one classification form.
pub struct FieldEngine {
    store: FieldStore,
    config: EngineConfig,
    classification: ClassificationContext,
    observer: Arc<dyn SnapshotObserver>,
    revision: u64,
}

impl fmt::Debug for FieldEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldEngine")
            .field("fields", &self.store.schema().len())
            .field("classification", &self.classification.code)
            .field("revision", &self.revision)
            .finish_non_exhaustive()
    }
}

impl Default for FieldEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default(), Arc::new(NoopObserver))
    }
}

impl FieldEngine {
    /// Creates an engine with an empty schema. Nothing is emitted until the
    /// first stimulus.
    #[must_use]
    pub fn new(config: EngineConfig, observer: Arc<dyn SnapshotObserver>) -> Self {
        Self {
            store: FieldStore::default(),
            config,
            classification: ClassificationContext::default(),
            observer,
            revision: 0,
        }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn schema(&self) -> &Arc<Schema> {
        self.store.schema()
    }

    #[must_use]
    pub fn classification(&self) -> &ClassificationContext {
        &self.classification
    }

    /// Replaces the classification used to gate row deletions.
    ///
    /// Not a stimulus: values are untouched and nothing is emitted.
    pub fn set_classification(&mut self, classification: ClassificationContext) {
        self.classification = classification;
    }

    /// Replaces the whole form with the defaults of `schema`.
    ///
    /// Every previous value is discarded, whichever schema it came from.
    pub fn initialize(&mut self, schema: Arc<Schema>) {
        let _span = debug_span!("stimulus", kind = "schema_swap", fields = schema.len()).entered();
        for issue in schema.issues() {
            warn!(%issue, "schema authoring issue");
        }
        self.store.initialize(schema);
        if self.config.emit_on_schema_swap {
            self.emit(Stimulus::SchemaSwap);
        }
    }

    /// Loads `schema` unless it is the one already active.
    ///
    /// Identity is pointer identity of the `Arc`: handing the engine the same
    /// schema again keeps the user's edits, while any other schema (even an
    /// equal copy) starts a new context. Returns `true` if the form was reset.
    pub fn load_schema(&mut self, schema: Arc<Schema>) -> bool {
        if Arc::ptr_eq(self.store.schema(), &schema) {
            debug!("schema unchanged, keeping current values");
            return false;
        }
        self.initialize(schema);
        true
    }

    /// Current value of a field.
    #[must_use]
    pub fn value(&self, field_id: &str) -> Option<&FieldValue> {
        self.store.get(field_id)
    }

    /// Rows of a table field, empty when absent or not a table.
    #[must_use]
    pub fn table_rows(&self, field_id: &str) -> &[TableRow] {
        self.store.table_rows(field_id)
    }

    /// User edit of one field.
    ///
    /// Overwrites the value, resizes any table linked to the field, and emits
    /// once. Edits to fields outside the active schema are ignored.
    ///
    /// Writing rows straight into a linked table does not touch its linked
    /// number; only [`add_table_row`](Self::add_table_row) and
    /// [`remove_table_row`](Self::remove_table_row) sync backward.
    pub fn set_field_value(&mut self, field_id: &str, value: impl Into<FieldValue>) {
        let _span = debug_span!("stimulus", kind = "user_edit", field_id).entered();
        let Some(field) = self.store.schema().field(field_id) else {
            debug!("ignoring edit to field outside the active schema");
            return;
        };
        if let Some(linked) = field.linked_field_id.as_deref().filter(|_| field.is_table()) {
            debug!(linked, "table written directly, linked field left unchanged");
        }
        self.store.set(field_id, value.into());
        sync::forward(&mut self.store, field_id, self.config.max_linked_rows);
        self.emit(Stimulus::UserEdit);
    }

    /// User adds a row to a table.
    ///
    /// The row is built from the column defaults and the linked numeric
    /// field, if any, is set to the new row count. Returns the new row count,
    /// or `None` (and emits nothing) if `field_id` is not a table.
    pub fn add_table_row(&mut self, field_id: &str) -> Option<usize> {
        let _span = debug_span!("stimulus", kind = "add_row", field_id).entered();
        let rows = self.store.push_default_row(field_id)?;
        sync::backward(&mut self.store, field_id);
        self.emit(Stimulus::UserEdit);
        Some(rows)
    }

    /// User removes the row at `index` from a table.
    ///
    /// Returns the removed row, or `Ok(None)` when there was nothing to remove
    /// (unknown table or index out of range), in which case nothing is
    /// emitted.
    ///
    /// # Errors
    ///
    /// Returns [`RowOperationError::BelowClassificationMinimum`] when the
    /// removal would leave fewer rows than the active classification requires.
    /// The form is left unchanged.
    pub fn remove_table_row(
        &mut self,
        field_id: &str,
        index: usize,
    ) -> Result<Option<TableRow>, RowOperationError> {
        let _span = debug_span!("stimulus", kind = "remove_row", field_id, index).entered();
        let Some(table) = self.store.schema().field(field_id).filter(|f| f.is_table()) else {
            return Ok(None);
        };
        let rows = self.store.row_count(field_id);
        if index >= rows {
            debug!(rows, "row index out of range, nothing to remove");
            return Ok(None);
        }

        let code = self.classification.code();
        let minimum = self.config.minimum_rows_for(code);
        if rows - 1 < minimum {
            let err = RowOperationError::BelowClassificationMinimum {
                field_id: field_id.to_string(),
                label: table.label.clone(),
                code: code.unwrap_or_default().to_string(),
                minimum,
            };
            warn!(%err, rows, "row removal rejected");
            return Err(err);
        }

        let removed = self.store.remove_row(field_id, index);
        sync::backward(&mut self.store, field_id);
        self.emit(Stimulus::UserEdit);
        Ok(removed)
    }

    /// Applies a batch of external suggestions.
    ///
    /// Only defined values that differ from the stored ones are written. If
    /// nothing changes the call is a complete no-op and nothing is emitted, so
    /// reapplying a consumed batch is safe. Clearing the batch afterwards is
    /// up to the caller.
    pub fn apply_external(&mut self, batch: &UpdateBatch) -> MergeOutcome {
        let _span =
            debug_span!("stimulus", kind = "external_merge", entries = batch.len()).entered();
        let outcome = merge::apply(&mut self.store, batch, self.config.max_linked_rows);
        if outcome.is_noop() {
            debug!("external batch changed nothing");
        } else {
            debug!(applied = outcome.applied.len(), "external batch applied");
            self.emit(Stimulus::ExternalMerge);
        }
        outcome
    }

    /// Whether every required field is filled in.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        completeness::is_complete(self.store.schema(), self.store.values())
    }

    /// Required fields still blocking a save, in schema order.
    #[must_use]
    pub fn missing_required(&self) -> Vec<MissingField> {
        completeness::missing_required(self.store.schema(), self.store.values())
    }

    /// Checks all values against their input constraints.
    #[must_use]
    pub fn validate(&self) -> ValidationResult {
        validation::validate(self.store.schema(), self.store.values())
    }

    /// Copy of the full value map.
    #[must_use]
    pub fn data(&self) -> FieldValueMap {
        self.store.values().clone()
    }

    /// Pushes a full value map, e.g. when reopening a saved case.
    ///
    /// Values outside the schema are dropped, missing fields get their
    /// defaults, and every link is reconciled from its numeric field before
    /// one snapshot is emitted.
    pub fn set_data(&mut self, values: FieldValueMap) {
        let _span = debug_span!("stimulus", kind = "data_load", entries = values.len()).entered();
        self.store.replace_all(values);
        sync::forward_all(&mut self.store, self.config.max_linked_rows);
        self.emit(Stimulus::DataLoad);
    }

    /// Snapshot of the current state, tagged with the last emitted revision.
    ///
    /// Does not notify the observer.
    #[must_use]
    pub fn snapshot(&self, stimulus: Stimulus) -> FieldSnapshot {
        FieldSnapshot {
            revision: self.revision,
            stimulus,
            complete: self.is_complete(),
            values: self.store.share(),
        }
    }

    fn emit(&mut self, stimulus: Stimulus) {
        self.revision += 1;
        let snapshot = self.snapshot(stimulus);
        debug!(
            revision = snapshot.revision,
            complete = snapshot.complete,
            "emitting snapshot"
        );
        self.observer.on_snapshot(&snapshot);
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;
    use crate::emit::LatestSnapshot;
    use crate::schema::{ColumnType, FieldDefinition, FieldType, TableColumnDefinition};
    use crate::types::CellValue;

    /// Observer keeping every snapshot, for ordering assertions.
    #[derive(Default)]
    struct Recorder {
        snapshots: Mutex<Vec<FieldSnapshot>>,
    }

    impl Recorder {
        fn taken(&self) -> Vec<FieldSnapshot> {
            self.snapshots.lock().clone()
        }
    }

    impl SnapshotObserver for Recorder {
        fn on_snapshot(&self, snapshot: &FieldSnapshot) {
            self.snapshots.lock().push(snapshot.clone());
        }
    }

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

    fn payment_schema() -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            FieldDefinition::new("numero_cuotas", "Cuotas", FieldType::Number).required(),
            FieldDefinition::new("cronograma", "Cronograma", FieldType::Table)
                .with_columns(columns())
                .linked_to("numero_cuotas")
                .with_row_bounds(Some(0), None),
            FieldDefinition::new("observacion", "Observación", FieldType::Textarea),
        ]))
    }

    fn make_engine() -> (FieldEngine, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let mut engine = FieldEngine::new(
            EngineConfig::default(),
            Arc::clone(&recorder) as Arc<dyn SnapshotObserver>,
        );
        engine.initialize(payment_schema());
        (engine, recorder)
    }

    #[test]
    fn installment_schedule_scenario() {
        let (mut engine, _) = make_engine();
        assert!(engine.table_rows("cronograma").is_empty());
        assert_eq!(engine.value("numero_cuotas"), Some(&FieldValue::blank()));

        engine.set_field_value("numero_cuotas", 3.0);
        assert_eq!(engine.table_rows("cronograma").len(), 3);
        assert_eq!(engine.table_rows("cronograma")[0]["monto"], CellValue::Number(0.0));

        engine.remove_table_row("cronograma", 0).unwrap();
        assert_eq!(engine.table_rows("cronograma").len(), 2);
        assert_eq!(engine.value("numero_cuotas"), Some(&FieldValue::Number(2.0)));

        let batch = UpdateBatch::new().with("numero_cuotas", 5.0);
        let outcome = engine.apply_external(&batch);
        assert_eq!(outcome.applied, vec!["numero_cuotas".to_string()]);
        assert_eq!(engine.table_rows("cronograma").len(), 5);

        assert!(engine.apply_external(&batch).is_noop());
        assert_eq!(engine.table_rows("cronograma").len(), 5);
    }

    #[test]
    fn one_snapshot_per_stimulus() {
        let (mut engine, recorder) = make_engine();
        engine.set_field_value("numero_cuotas", 4.0);
        engine.add_table_row("cronograma");
        engine.apply_external(&UpdateBatch::new().with("numero_cuotas", 2.0));

        let kinds: Vec<Stimulus> = recorder.taken().iter().map(|s| s.stimulus).collect();
        assert_eq!(
            kinds,
            vec![
                Stimulus::SchemaSwap,
                Stimulus::UserEdit,
                Stimulus::UserEdit,
                Stimulus::ExternalMerge
            ]
        );
        let revisions: Vec<u64> = recorder.taken().iter().map(|s| s.revision).collect();
        assert_eq!(revisions, vec![1, 2, 3, 4]);
    }

    #[test]
    fn snapshots_are_settled_state() {
        let (mut engine, recorder) = make_engine();
        engine.set_field_value("numero_cuotas", 3.0);
        let last = recorder.taken().pop().unwrap();
        assert_eq!(last.values["cronograma"].as_rows().map(<[_]>::len), Some(3));
        assert!(last.complete);
    }

    #[test]
    fn snapshots_are_immutable_after_emission() {
        let (mut engine, recorder) = make_engine();
        engine.set_field_value("observacion", "primera");
        engine.set_field_value("observacion", "segunda");
        let taken = recorder.taken();
        assert_eq!(taken[1].values["observacion"], FieldValue::text("primera"));
        assert_eq!(taken[2].values["observacion"], FieldValue::text("segunda"));
    }

    #[test]
    fn add_row_writes_linked_field_once_without_resizing() {
        let (mut engine, recorder) = make_engine();
        engine.set_field_value("numero_cuotas", 2.0);
        let before = recorder.taken().len();

        assert_eq!(engine.add_table_row("cronograma"), Some(3));
        assert_eq!(engine.value("numero_cuotas"), Some(&FieldValue::Number(3.0)));
        assert_eq!(engine.table_rows("cronograma").len(), 3);
        assert_eq!(recorder.taken().len(), before + 1);
    }

    #[test]
    fn add_row_to_non_table_is_ignored() {
        let (mut engine, recorder) = make_engine();
        let before = recorder.taken().len();
        assert_eq!(engine.add_table_row("observacion"), None);
        assert_eq!(engine.add_table_row("missing"), None);
        assert_eq!(recorder.taken().len(), before);
    }

    #[test]
    fn removal_below_classification_minimum_is_rejected() {
        let (mut engine, recorder) = make_engine();
        engine.set_classification(ClassificationContext::new("PF"));
        engine.set_field_value("numero_cuotas", 2.0);
        let before_values = engine.data();
        let before_count = recorder.taken().len();

        let err = engine.remove_table_row("cronograma", 1).unwrap_err();
        assert_eq!(
            err,
            RowOperationError::BelowClassificationMinimum {
                field_id: "cronograma".to_string(),
                label: "Cronograma".to_string(),
                code: "PF".to_string(),
                minimum: 2,
            }
        );
        assert_eq!(
            err.to_string(),
            "classification PF requires at least 2 rows in Cronograma"
        );
        assert_eq!(engine.data(), before_values);
        assert_eq!(recorder.taken().len(), before_count);
    }

    #[test]
    fn cf_allows_removal_down_to_one_row() {
        let (mut engine, _) = make_engine();
        engine.set_classification(ClassificationContext::new("CF"));
        engine.set_field_value("numero_cuotas", 2.0);
        assert!(engine.remove_table_row("cronograma", 0).unwrap().is_some());
        assert!(engine.remove_table_row("cronograma", 0).is_err());
        assert_eq!(engine.table_rows("cronograma").len(), 1);
        assert_eq!(engine.value("numero_cuotas"), Some(&FieldValue::Number(1.0)));
    }

    #[test]
    fn out_of_range_removal_is_silent_noop() {
        let (mut engine, recorder) = make_engine();
        engine.set_field_value("numero_cuotas", 1.0);
        let before = recorder.taken().len();
        assert_eq!(engine.remove_table_row("cronograma", 7), Ok(None));
        assert_eq!(engine.remove_table_row("observacion", 0), Ok(None));
        assert_eq!(recorder.taken().len(), before);
    }

    #[test]
    fn non_numeric_link_value_leaves_table_alone() {
        let (mut engine, _) = make_engine();
        engine.set_field_value("numero_cuotas", 2.0);
        engine.set_field_value("numero_cuotas", "dos");
        assert_eq!(engine.table_rows("cronograma").len(), 2);
        engine.set_field_value("numero_cuotas", -1.0);
        assert_eq!(engine.table_rows("cronograma").len(), 2);
    }

    #[test]
    fn huge_link_value_leaves_table_alone() {
        let (mut engine, recorder) = make_engine();
        engine.set_field_value("numero_cuotas", 2.0);
        let before = recorder.taken().len();

        engine.set_field_value("numero_cuotas", 1e30);
        assert_eq!(engine.table_rows("cronograma").len(), 2);
        assert_eq!(engine.value("numero_cuotas"), Some(&FieldValue::Number(1e30)));
        assert_eq!(recorder.taken().len(), before + 1);

        let outcome = engine.apply_external(&UpdateBatch::new().with("numero_cuotas", "1e300"));
        assert_eq!(outcome.applied, vec!["numero_cuotas".to_string()]);
        assert!(outcome.effects.is_empty());
        assert_eq!(engine.table_rows("cronograma").len(), 2);
    }

    #[test]
    fn link_ceiling_is_configurable() {
        let config = EngineConfig {
            max_linked_rows: 10,
            ..EngineConfig::default()
        };
        let mut engine = FieldEngine::new(config, Arc::new(NoopObserver));
        engine.initialize(payment_schema());
        engine.set_field_value("numero_cuotas", 10.0);
        assert_eq!(engine.table_rows("cronograma").len(), 10);
        engine.set_field_value("numero_cuotas", 11.0);
        assert_eq!(engine.table_rows("cronograma").len(), 10);
    }

    #[test]
    fn writing_rows_directly_keeps_linked_number() {
        let (mut engine, _) = make_engine();
        engine.set_field_value("numero_cuotas", 3.0);
        let mut rows = engine.table_rows("cronograma").to_vec();
        rows.push(rows[0].clone());
        engine.set_field_value("cronograma", rows);

        assert_eq!(engine.table_rows("cronograma").len(), 4);
        assert_eq!(engine.value("numero_cuotas"), Some(&FieldValue::Number(3.0)));
    }

    #[test]
    fn schema_swap_discards_all_edits() {
        let (mut engine, _) = make_engine();
        engine.set_field_value("numero_cuotas", 3.0);
        engine.set_field_value("observacion", "promesa de pago");

        let other = Arc::new(Schema::new(vec![
            FieldDefinition::new("observacion", "Observación", FieldType::Textarea),
            FieldDefinition::new("contactado", "Contactado", FieldType::Checkbox),
        ]));
        engine.initialize(other);

        let data = engine.data();
        assert_eq!(data.len(), 2);
        assert_eq!(data["observacion"], FieldValue::blank());
        assert_eq!(data["contactado"], FieldValue::Bool(false));
    }

    #[test]
    fn load_schema_is_identity_gated() {
        let (mut engine, recorder) = make_engine();
        let schema = Arc::clone(engine.schema());
        engine.set_field_value("observacion", "nota");

        assert!(!engine.load_schema(Arc::clone(&schema)));
        assert_eq!(engine.value("observacion"), Some(&FieldValue::text("nota")));

        let before = recorder.taken().len();
        assert!(engine.load_schema(Arc::new((*schema).clone())));
        assert_eq!(engine.value("observacion"), Some(&FieldValue::blank()));
        assert_eq!(recorder.taken().len(), before + 1);
    }

    #[test]
    fn schema_swap_emission_can_be_disabled() {
        let latest = Arc::new(LatestSnapshot::new());
        let config = EngineConfig {
            emit_on_schema_swap: false,
            ..EngineConfig::default()
        };
        let mut engine = FieldEngine::new(config, Arc::clone(&latest) as Arc<dyn SnapshotObserver>);
        engine.initialize(payment_schema());
        assert_eq!(latest.count(), 0);
        engine.set_field_value("observacion", "x");
        assert_eq!(latest.count(), 1);
    }

    #[test]
    fn edits_outside_schema_are_ignored() {
        let (mut engine, recorder) = make_engine();
        let before = recorder.taken().len();
        engine.set_field_value("desconocido", 1.0);
        assert!(engine.value("desconocido").is_none());
        assert_eq!(recorder.taken().len(), before);
    }

    #[test]
    fn set_data_reconciles_links_and_backfills() {
        let (mut engine, recorder) = make_engine();
        let mut loaded = FieldValueMap::new();
        loaded.insert("numero_cuotas".to_string(), FieldValue::Number(2.0));
        loaded.insert("cronograma".to_string(), FieldValue::Rows(Vec::new()));
        engine.set_data(loaded);

        assert_eq!(engine.table_rows("cronograma").len(), 2);
        assert_eq!(engine.value("observacion"), Some(&FieldValue::blank()));
        assert_eq!(recorder.taken().last().map(|s| s.stimulus), Some(Stimulus::DataLoad));
    }

    #[test]
    fn get_data_round_trips_through_set_data() {
        let (mut engine, _) = make_engine();
        engine.set_field_value("numero_cuotas", 2.0);
        engine.set_field_value("observacion", "ok");
        let saved = engine.data();

        let (mut reopened, _) = make_engine();
        reopened.set_data(saved.clone());
        assert_eq!(reopened.data(), saved);
    }

    #[test]
    fn completeness_tracks_required_fields() {
        let (mut engine, recorder) = make_engine();
        assert!(!engine.is_complete());
        assert_eq!(engine.missing_required().len(), 1);
        assert!(!recorder.taken()[0].complete);

        engine.set_field_value("numero_cuotas", 1.0);
        assert!(engine.is_complete());
        assert!(recorder.taken().last().unwrap().complete);
    }

    #[test]
    fn validate_reports_required_cells() {
        let (mut engine, _) = make_engine();
        engine.set_field_value("numero_cuotas", 1.0);
        assert!(engine.validate().is_valid());

        let mut rows = engine.table_rows("cronograma").to_vec();
        rows[0].insert("monto".to_string(), CellValue::Null);
        engine.set_field_value("cronograma", rows);
        assert_eq!(engine.validate().errors().len(), 1);
    }

    #[test]
    fn snapshot_does_not_notify() {
        let (engine, recorder) = make_engine();
        let before = recorder.taken().len();
        let snapshot = engine.snapshot(Stimulus::UserEdit);
        assert_eq!(snapshot.revision, 1);
        assert_eq!(recorder.taken().len(), before);
    }
}
