use ferry_observability::ErrorKind;
use ferry_schema::{FieldType, SchemaError};
use ferry_store::StoreError;
use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum WriterError {
    #[snafu(display("Invalid configuration: {message}"))]
    InvalidConfig { message: String },
    #[snafu(display("Invalid column configuration"))]
    Schema { source: SchemaError },
    #[snafu(display("Store error: {operation}"))]
    Store {
        operation: &'static str,
        source: StoreError,
    },
    #[snafu(display(
        "Bulk request rejected {failed} of {total} operations, first failure: {reason}"
    ))]
    PartialFailure {
        failed: usize,
        total: usize,
        reason: String,
    },
    #[snafu(display("All {total} records of the batch are dirty, first error: {reason}"))]
    AllDirty { total: usize, reason: String },
    #[snafu(display("Type error: unsupported type {field_type} for column {column}"))]
    UnsupportedValueType {
        column: String,
        field_type: FieldType,
    },
    #[snafu(display(
        "Column number mismatch: record has {actual} columns, the writer has {expected}"
    ))]
    ColumnCount { expected: usize, actual: usize },
    #[snafu(display("Upstream source failed"))]
    Upstream { source: SourceError },
    #[snafu(display("Cancelled during {operation}"))]
    Cancelled { operation: &'static str },
    #[snafu(display("Job must be prepared before it is split"))]
    NotPrepared,
}

pub type Result<T, E = WriterError> = std::result::Result<T, E>;

impl WriterError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidConfig { .. }
            | Self::Schema { .. }
            | Self::UnsupportedValueType { .. }
            | Self::ColumnCount { .. } => ErrorKind::Configuration,
            Self::Store { source, .. } => source.kind(),
            Self::PartialFailure { .. } => ErrorKind::Conflict,
            Self::AllDirty { .. } | Self::Upstream { .. } => ErrorKind::Validation,
            Self::Cancelled { .. } | Self::NotPrepared => ErrorKind::Internal,
        }
    }
}

/// An error reported by the upstream record source.
#[derive(Debug, Snafu)]
#[snafu(display("{message}"))]
pub struct SourceError {
    message: String,
}

impl SourceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Why a single record could not become a bulk operation.
///
/// Records failing this way are dirty: they are dropped from the batch and
/// counted, and the rest of the batch is still written.
#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(visibility(pub))]
pub enum RecordError {
    #[snafu(display("{field} RECORD FIELD NOT FOUND"))]
    MissingField { field: String },
    #[snafu(display("record has multiple columns found by name: {field}"))]
    DuplicateField { field: String },
    #[snafu(display("column {column} cannot be read as {expected}: {value}"))]
    Coerce {
        column: String,
        expected: &'static str,
        value: String,
    },
    #[snafu(display("column {column} value {value} does not match its date format"))]
    InvalidDate { column: String, value: String },
    #[snafu(display("version {value} is not an integer"))]
    InvalidVersion { value: String },
    #[snafu(display("{action} operation requires a document id"))]
    MissingId { action: &'static str },
}
