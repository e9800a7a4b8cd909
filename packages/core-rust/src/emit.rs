//! Snapshot emission.
//!
//! Defines the immutable [`FieldSnapshot`] published at every settle point,
//! [`CompositeSnapshotObserver`] which fans a snapshot out to several
//! observers, and [`LatestSnapshot`] which keeps the most recent one for
//! pull-style consumers.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::traits::SnapshotObserver;
use crate::types::FieldValueMap;

/// Kind of stimulus that produced a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stimulus {
    /// A new schema replaced the form.
    SchemaSwap,
    /// A user edited a value or added/removed a table row.
    UserEdit,
    /// An external update batch changed at least one value.
    ExternalMerge,
    /// Values were pushed wholesale through `set_data`.
    DataLoad,
}

/// Immutable view of the form after one stimulus settled.
#[derive(Debug, Clone, Serialize)]
pub struct FieldSnapshot {
    /// Monotonic per-engine counter, starting at 1 for the first emission.
    pub revision: u64,
    pub stimulus: Stimulus,
    /// Whether every required field is filled in.
    pub complete: bool,
    pub values: Arc<FieldValueMap>,
}

/// Composite observer that fans out to multiple observers in registration order.
#[derive(Default)]
pub struct CompositeSnapshotObserver {
    observers: Vec<Arc<dyn SnapshotObserver>>,
}

impl CompositeSnapshotObserver {
    #[must_use]
    pub fn new(observers: Vec<Arc<dyn SnapshotObserver>>) -> Self {
        Self { observers }
    }

    /// Adds an observer after construction.
    pub fn add(&mut self, observer: Arc<dyn SnapshotObserver>) {
        self.observers.push(observer);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl SnapshotObserver for CompositeSnapshotObserver {
    fn on_snapshot(&self, snapshot: &FieldSnapshot) {
        for observer in &self.observers {
            observer.on_snapshot(snapshot);
        }
    }
}

/// Observer that remembers the last snapshot and how many it has seen.
#[derive(Debug, Default)]
pub struct LatestSnapshot {
    inner: Mutex<(Option<FieldSnapshot>, u64)>,
}

impl LatestSnapshot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent snapshot, if any was emitted.
    #[must_use]
    pub fn get(&self) -> Option<FieldSnapshot> {
        self.inner.lock().0.clone()
    }

    /// Number of snapshots received so far.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.inner.lock().1
    }
}

impl SnapshotObserver for LatestSnapshot {
    fn on_snapshot(&self, snapshot: &FieldSnapshot) {
        let mut guard = self.inner.lock();
        guard.0 = Some(snapshot.clone());
        guard.1 += 1;
    }
}
