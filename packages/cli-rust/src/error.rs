use std::path::PathBuf;

/// Errors surfaced by the `casefield` binary.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid schema in {path}: {source:#}")]
    Schema {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
    #[error("invalid script in {path}: {source}")]
    Script {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid row minimum {spec:?}, expected CODE=ROWS")]
    RowMinimum { spec: String },
    #[error("failed to write output: {0}")]
    Output(#[from] std::io::Error),
}
