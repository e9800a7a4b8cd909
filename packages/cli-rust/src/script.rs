//! Stimulus scripts.
//!
//! A script is a JSON array of steps tagged by `op`:
//!
//! ```json
//! [
//!   {"op": "classification", "code": "PF"},
//!   {"op": "set", "field": "numero_cuotas", "value": 3},
//!   {"op": "remove_row", "field": "cronograma", "index": 0},
//!   {"op": "merge", "values": {"monto_pago": 150.5}}
//! ]
//! ```

use std::io::Write;
use std::path::Path;

use casefield_core::{
    ClassificationContext, FieldEngine, FieldValue, FieldValueMap, InstallmentPlan, UpdateBatch,
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::CliError;
use crate::output::{JsonLines, OutputEvent};

/// Which amount a `suggest` step derives from the payment plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAmount {
    #[default]
    NextPending,
    Outstanding,
}

/// One stimulus applied to the engine.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// User edit of a single field.
    Set { field: String, value: FieldValue },
    AddRow { field: String },
    RemoveRow { field: String, index: usize },
    /// External update batch; `null` entries are undefined suggestions.
    Merge { values: UpdateBatch },
    /// External update batch computed from a payment plan.
    Suggest {
        plan: InstallmentPlan,
        field: String,
        #[serde(default)]
        amount: SuggestedAmount,
    },
    /// Switches the active classification; `null` clears it.
    Classification { code: Option<String> },
    /// Wholesale replacement of the form values.
    Load { values: FieldValueMap },
}

/// Reads a script file.
///
/// # Errors
///
/// Returns [`CliError::Read`] if the file cannot be read and
/// [`CliError::Script`] if it is not a valid step array.
pub fn load(path: &Path) -> Result<Vec<Step>, CliError> {
    let text = std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| CliError::Script {
        path: path.to_path_buf(),
        source,
    })
}

/// Applies `steps` in order. Rejected row removals are written to `output`
/// and replay continues with the next step.
pub fn replay<W: Write>(engine: &mut FieldEngine, steps: &[Step], output: &JsonLines<W>) {
    for (index, step) in steps.iter().enumerate() {
        match step {
            Step::Set { field, value } => engine.set_field_value(field, value.clone()),
            Step::AddRow { field } => {
                if engine.add_table_row(field).is_none() {
                    warn!(step = index, field = %field, "add_row on a field that is not a table");
                }
            }
            Step::RemoveRow { field, index: row } => {
                if let Err(err) = engine.remove_table_row(field, *row) {
                    output.write(&OutputEvent::Rejected {
                        step: index,
                        message: err.to_string(),
                    });
                }
            }
            Step::Merge { values } => {
                engine.apply_external(values);
            }
            Step::Suggest {
                plan,
                field,
                amount,
            } => {
                let batch = match amount {
                    SuggestedAmount::NextPending => plan.next_pending_amount(field),
                    SuggestedAmount::Outstanding => plan.outstanding_amount(field),
                };
                engine.apply_external(&batch);
            }
            Step::Classification { code } => {
                info!(step = index, code = ?code, "classification changed");
                engine.set_classification(ClassificationContext { code: code.clone() });
            }
            Step::Load { values } => engine.set_data(values.clone()),
        }
    }
}
