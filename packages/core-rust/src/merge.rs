//! External update merge channel.
//!
//! Suggestions computed outside the form (next pending installment amount,
//! full outstanding balance, ...) arrive as an [`UpdateBatch`]: a partial
//! field id -> value map. [`apply`] writes only the entries that would change
//! something, so reapplying a batch that was already consumed changes nothing
//! and the engine emits nothing for it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::store::FieldStore;
use crate::sync::{self, SyncEffect};
use crate::types::FieldValue;

/// Partial map of externally suggested values.
///
/// An entry holding `None` is an undefined suggestion and is always skipped.
/// In JSON an entry set to `null` reads as `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UpdateBatch {
    entries: BTreeMap<String, Option<FieldValue>>,
}

impl UpdateBatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a suggestion. Later suggestions for the same field win.
    #[must_use]
    pub fn with(mut self, field_id: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(field_id, Some(value.into()));
        self
    }

    pub fn insert(&mut self, field_id: impl Into<String>, value: Option<FieldValue>) {
        self.entries.insert(field_id.into(), value);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, Option<&FieldValue>)> {
        self.entries.iter().map(|(id, value)| (id, value.as_ref()))
    }
}

impl<K: Into<String>> FromIterator<(K, FieldValue)> for UpdateBatch {
    fn from_iter<I: IntoIterator<Item = (K, FieldValue)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(id, value)| (id.into(), Some(value)))
                .collect(),
        }
    }
}

/// What a merge did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Fields whose stored value was replaced, in id order.
    pub applied: Vec<String>,
    /// Fields left alone: undefined, unknown, or already holding the value.
    pub skipped: Vec<String>,
    /// Table resizes driven by applied link sources.
    pub effects: Vec<SyncEffect>,
}

impl MergeOutcome {
    /// Returns `true` if the merge left the store untouched.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty() && self.effects.is_empty()
    }
}

/// Writes every defined, changed suggestion of `batch` into `store`.
///
/// Each applied value that is a link source gets a forward sync pass right
/// after it is written, so a later entry in the batch observes the resized
/// table. Backward sync never runs here: external values are not row
/// operations. `max_rows` caps link-driven resizes as in [`sync::forward`].
pub fn apply(store: &mut FieldStore, batch: &UpdateBatch, max_rows: usize) -> MergeOutcome {
    let mut outcome = MergeOutcome::default();

    for (field_id, value) in batch.iter() {
        let Some(value) = value.filter(|v| v.is_defined()) else {
            trace!(field_id = %field_id, "skipping undefined suggestion");
            outcome.skipped.push(field_id.clone());
            continue;
        };
        if !store.set(field_id, value.clone()) {
            trace!(field_id = %field_id, "suggestion matches stored value");
            outcome.skipped.push(field_id.clone());
            continue;
        }
        outcome.applied.push(field_id.clone());
        outcome.effects.extend(sync::forward(store, field_id, max_rows));
    }
    outcome
}
