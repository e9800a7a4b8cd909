use std::collections::BTreeMap;

/// Engine-level configuration.
///
/// Controls classification-specific row rules and emission behavior.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Minimum rows every table must keep when a row is deleted, keyed by
    /// classification code. Codes not listed impose no minimum.
    pub row_minimums: BTreeMap<String, usize>,
    /// Whether loading a schema publishes a snapshot of the freshly
    /// defaulted values.
    pub emit_on_schema_swap: bool,
    /// Largest row count a linked number may drive a table to. Larger
    /// values are stored but leave the table as it is.
    pub max_linked_rows: usize,
}

impl EngineConfig {
    /// Row minimum imposed by `code`, or 0 when the code has none.
    #[must_use]
    pub fn minimum_rows_for(&self, code: Option<&str>) -> usize {
        code.and_then(|c| self.row_minimums.get(c))
            .copied()
            .unwrap_or(0)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            row_minimums: BTreeMap::from([("PF".to_string(), 2), ("CF".to_string(), 1)]),
            emit_on_schema_swap: true,
            max_linked_rows: 600,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_config_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.minimum_rows_for(Some("PF")), 2);
        assert_eq!(config.minimum_rows_for(Some("CF")), 1);
        assert!(config.emit_on_schema_swap);
        assert_eq!(config.max_linked_rows, 600);
    }

    #[test]
    fn unknown_or_missing_code_has_no_minimum() {
        let config = EngineConfig::default();
        assert_eq!(config.minimum_rows_for(Some("RP")), 0);
        assert_eq!(config.minimum_rows_for(None), 0);
    }

    #[test]
    fn minimums_are_configurable() {
        let mut config = EngineConfig::default();
        config.row_minimums.insert("GA".to_string(), 3);
        config.row_minimums.remove("PF");
        assert_eq!(config.minimum_rows_for(Some("GA")), 3);
        assert_eq!(config.minimum_rows_for(Some("PF")), 0);
    }
}
