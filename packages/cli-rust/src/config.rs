//! Command-line configuration for the `casefield` binary.

use std::path::PathBuf;

use casefield_core::EngineConfig;
use clap::Parser;

use crate::error::CliError;

/// Replays a stimulus script through the field engine and prints every
/// emitted snapshot as one JSON line.
#[derive(Debug, Clone, Parser)]
#[command(name = "casefield", version, about)]
pub struct CliConfig {
    /// Schema document (`{"fields": [...]}`) of the leaf classification.
    #[arg(long, env = "CASEFIELD_SCHEMA")]
    pub schema: PathBuf,

    /// JSON array of steps to replay.
    #[arg(long, env = "CASEFIELD_SCRIPT")]
    pub script: PathBuf,

    /// Classification code active before the first step.
    #[arg(long, env = "CASEFIELD_CLASSIFICATION")]
    pub classification: Option<String>,

    /// Extra or replacement row minimum, as `CODE=ROWS`. Repeatable.
    #[arg(long = "min-rows", value_name = "CODE=ROWS")]
    pub min_rows: Vec<String>,

    /// Do not print a snapshot when the schema is loaded.
    #[arg(long)]
    pub no_swap_snapshot: bool,

    /// Default log filter when `RUST_LOG` is not set.
    #[arg(long, env = "CASEFIELD_LOG", default_value = "warn")]
    pub log_level: String,

    /// Emit logs as JSON instead of human-readable text.
    #[arg(long)]
    pub log_json: bool,
}

impl CliConfig {
    /// Builds the engine configuration, starting from the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::RowMinimum`] for a malformed `--min-rows` value.
    pub fn engine_config(&self) -> Result<EngineConfig, CliError> {
        let mut config = EngineConfig {
            emit_on_schema_swap: !self.no_swap_snapshot,
            ..EngineConfig::default()
        };
        for spec in &self.min_rows {
            let (code, rows) = parse_row_minimum(spec)?;
            config.row_minimums.insert(code, rows);
        }
        Ok(config)
    }
}

fn parse_row_minimum(spec: &str) -> Result<(String, usize), CliError> {
    let invalid = || CliError::RowMinimum {
        spec: spec.to_string(),
    };
    let (code, rows) = spec.split_once('=').ok_or_else(invalid)?;
    let code = code.trim();
    if code.is_empty() {
        return Err(invalid());
    }
    let rows = rows.trim().parse().map_err(|_| invalid())?;
    Ok((code.to_string(), rows))
}
