//! `casefield` core: schema-driven dynamic field engine for collection case forms.
//!
//! A [`Schema`] describes the fields of one leaf classification. The
//! [`FieldEngine`] holds their values, keeps tables and their linked numeric
//! fields in sync in both directions, merges external suggestions
//! idempotently, and publishes one [`FieldSnapshot`] per settled stimulus.

pub mod completeness;
pub mod config;
pub mod context;
pub mod emit;
pub mod engine;
pub mod error;
pub mod merge;
pub mod schema;
pub mod store;
pub mod suggest;
pub mod sync;
pub mod traits;
pub mod types;
pub mod validation;

pub use completeness::{is_complete, MissingField, MissingReason};
pub use config::EngineConfig;
pub use context::ClassificationContext;
pub use emit::{CompositeSnapshotObserver, FieldSnapshot, LatestSnapshot, Stimulus};
pub use engine::FieldEngine;
pub use error::RowOperationError;
pub use merge::{MergeOutcome, UpdateBatch};
pub use schema::{
    ColumnType, DateRange, FieldConstraints, FieldDefinition, FieldType, Schema, SchemaIssue,
    SelectOption, TableColumnDefinition,
};
pub use store::FieldStore;
pub use suggest::{Installment, InstallmentPlan, InstallmentStatus};
pub use sync::SyncEffect;
pub use traits::{NoopObserver, SnapshotObserver};
pub use types::{CellValue, FieldValue, FieldValueMap, TableRow};
pub use validation::{ValidationError, ValidationResult};
