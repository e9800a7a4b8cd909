//! Bidirectional table <-> number link synchronization.
//!
//! A table field with `linkedFieldId = F` keeps its row count consistent with
//! the numeric field `F`:
//!
//! - **Forward** ([`forward`]): after `F` changes, the table is resized to
//!   `floor(F)` rows (clamped into the table's row bounds). Only positive
//!   numbers drive a resize; anything else, or a count above the engine's
//!   `max_linked_rows` ceiling, leaves the table untouched.
//! - **Backward** ([`backward`]): after a user adds or removes a row, `F` is
//!   set to the new row count.
//!
//! Neither direction triggers the other. The caller runs exactly one of them
//! per stimulus, which is what keeps a single row operation from writing `F`
//! more than once or resizing the table a second time.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::store::FieldStore;
use crate::types::FieldValue;

/// Write performed by a synchronization pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEffect {
    /// A table was resized to follow its linked number.
    Resized {
        table_id: String,
        from: usize,
        to: usize,
    },
    /// A linked number was overwritten with its table's row count.
    CountWritten { field_id: String, rows: usize },
}

/// Resizes every table linked to `source_id` so its row count matches the
/// source's value.
///
/// Tables are visited in schema order. A non-numeric or non-positive source
/// value skips the pass for this stimulus, and so does a clamped count above
/// `max_rows`.
pub fn forward(store: &mut FieldStore, source_id: &str, max_rows: usize) -> Vec<SyncEffect> {
    let schema = Arc::clone(store.schema());
    let mut effects = Vec::new();

    for table in schema.tables_linked_to(source_id) {
        let Some(requested) = store.get(source_id).and_then(FieldValue::requested_row_count)
        else {
            trace!(
                source_id,
                table_id = %table.id,
                "link source is not a positive number, skipping resize"
            );
            continue;
        };
        let target = table.clamp_rows(requested);
        if target > max_rows {
            debug!(
                table_id = %table.id,
                requested,
                max_rows,
                "linked row count above ceiling, skipping resize"
            );
            continue;
        }
        if target != requested {
            debug!(
                table_id = %table.id,
                requested,
                target,
                "requested row count clamped to table bounds"
            );
        }

        let from = store.row_count(&table.id);
        if store.resize_rows(&table.id, target) {
            debug!(table_id = %table.id, from, to = target, "table resized from linked field");
            effects.push(SyncEffect::Resized {
                table_id: table.id.clone(),
                from,
                to: target,
            });
        }
    }
    effects
}

/// Runs [`forward`] for every link source of the active schema.
///
/// Used after values are loaded wholesale, when any source may have changed.
pub fn forward_all(store: &mut FieldStore, max_rows: usize) -> Vec<SyncEffect> {
    let schema = Arc::clone(store.schema());
    let mut seen = HashSet::new();
    let sources: Vec<&str> = schema
        .fields()
        .iter()
        .filter(|f| f.is_table())
        .filter_map(|f| f.linked_field_id.as_deref())
        .filter(|source| seen.insert(*source))
        .collect();

    let mut effects = Vec::new();
    for source in sources {
        effects.extend(forward(store, source, max_rows));
    }
    effects
}

/// Writes the row count of `table_id` into its linked field, if it has one.
///
/// Only user row operations call this. Nothing is written when the linked
/// field already holds that count (as a number or numeric text).
#[allow(clippy::float_cmp, clippy::cast_precision_loss)]
pub fn backward(store: &mut FieldStore, table_id: &str) -> Option<SyncEffect> {
    let schema = Arc::clone(store.schema());
    let field_id = schema.field(table_id)?.linked_field_id.as_deref()?;
    if !schema.contains(field_id) {
        return None;
    }

    let rows = store.row_count(table_id);
    // Row counts fit in an f64 mantissa.
    let count = rows as f64;
    let current = store.get(field_id).and_then(FieldValue::as_number);
    if current == Some(count) {
        return None;
    }

    store.set(field_id, FieldValue::Number(count));
    debug!(table_id, field_id, rows, "linked field updated from table");
    Some(SyncEffect::CountWritten {
        field_id: field_id.to_string(),
        rows,
    })
}
