//! `casefield`: replays a stimulus script against a form schema and prints
//! the emitted snapshots as JSON lines.

mod config;
mod error;
mod output;
mod script;

use std::io::{self, BufWriter, Write};
use std::sync::Arc;

use anyhow::Context;
use casefield_core::{ClassificationContext, FieldEngine, Schema};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::CliConfig;
use crate::error::CliError;
use crate::output::{JsonLines, OutputEvent};

fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();
    init_tracing(&config);

    let stdout = BufWriter::new(io::stdout());
    let complete = run(&config, stdout).context("casefield run failed")?;
    info!(complete, "replay finished");
    Ok(())
}

/// Logs go to stderr so stdout carries only JSON lines.
fn init_tracing(config: &CliConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);
    if config.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Loads the schema and script, replays every step, and writes a final
/// summary line. Returns whether the form ended complete.
fn run<W: Write + Send + 'static>(config: &CliConfig, writer: W) -> Result<bool, CliError> {
    let text = std::fs::read_to_string(&config.schema).map_err(|source| CliError::Read {
        path: config.schema.clone(),
        source,
    })?;
    let schema = Schema::from_json(&text).map_err(|source| CliError::Schema {
        path: config.schema.clone(),
        source,
    })?;
    let steps = script::load(&config.script)?;
    info!(fields = schema.len(), steps = steps.len(), "loaded inputs");

    let output = Arc::new(JsonLines::new(writer));
    let mut engine = FieldEngine::new(config.engine_config()?, output.clone());
    if let Some(code) = &config.classification {
        engine.set_classification(ClassificationContext::new(code.clone()));
    }
    engine.initialize(Arc::new(schema));

    script::replay(&mut engine, &steps, &output);

    let complete = engine.is_complete();
    output.write(&OutputEvent::Summary {
        complete,
        missing: engine
            .missing_required()
            .iter()
            .map(ToString::to_string)
            .collect(),
        errors: engine
            .validate()
            .errors()
            .iter()
            .map(ToString::to_string)
            .collect(),
    });
    output.finish()?;
    Ok(complete)
}
