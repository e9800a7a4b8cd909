/// Rejection of a user row operation.
///
/// The operation is refused synchronously and the form is left exactly as it
/// was. The message is meant to be shown to the agent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RowOperationError {
    #[error("classification {code} requires at least {minimum} rows in {label}")]
    BelowClassificationMinimum {
        field_id: String,
        label: String,
        code: String,
        minimum: usize,
    },
}
