/// Classification the agent has selected for the case being managed.
///
/// Threaded into the engine by the consumer. The engine reads the code only to
/// look up row-count minimums when a table row is deleted; no other meaning is
/// attached to it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassificationContext {
    /// Short code of the selected classification (e.g. `"PF"`, `"CF"`).
    /// `None` before the agent picks one.
    pub code: Option<String>,
}

impl ClassificationContext {
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
        }
    }

    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }
}
