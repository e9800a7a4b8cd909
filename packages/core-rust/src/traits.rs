use crate::emit::FieldSnapshot;

/// Consumer of settled form state.
///
/// Called once per settle point (schema swap, user action, effective external
/// merge, data load) with an immutable snapshot of the whole value map.
/// Implementations typically drive save-button enablement or hand the values
/// to persistence.
pub trait SnapshotObserver: Send + Sync {
    /// Called after a stimulus has fully propagated.
    fn on_snapshot(&self, snapshot: &FieldSnapshot);
}

/// Observer that drops every snapshot.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SnapshotObserver for NoopObserver {
    fn on_snapshot(&self, _: &FieldSnapshot) {}
}
