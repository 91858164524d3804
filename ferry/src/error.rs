use std::path::PathBuf;

use ferry_observability::{ErrorKind, ObservabilityError};
use ferry_schema::SchemaError;
use ferry_store::StoreError;
use ferry_writer::WriterError;
use snafu::Snafu;

/// CLI error types.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CliError {
    #[snafu(display("Failed to read job configuration {}", path.display()))]
    ReadConfig {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Invalid job configuration {}", path.display()))]
    ParseConfig {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[snafu(display("Invalid {name} argument: {message}"))]
    InvalidArgument { name: &'static str, message: String },
    #[snafu(display("IO error"))]
    Io { source: std::io::Error },
    #[snafu(display("Line {line} is not valid JSON"))]
    RecordParse {
        line: usize,
        source: serde_json::Error,
    },
    #[snafu(display("Line {line} is not a record: {message}"))]
    InvalidRecord { line: usize, message: String },
    #[snafu(display("JSON encode error"))]
    JsonEncode { source: serde_json::Error },
    #[snafu(display("Failed store operation {operation}"))]
    Store {
        operation: &'static str,
        source: StoreError,
    },
    #[snafu(display("Invalid column configuration"))]
    Schema { source: SchemaError },
    #[snafu(transparent)]
    Writer { source: WriterError },
    #[snafu(display("Task {task} panicked"))]
    TaskJoin {
        task: usize,
        source: tokio::task::JoinError,
    },
    #[snafu(display("Failed to initialize observability"))]
    Observability { source: ObservabilityError },
}

impl CliError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ReadConfig { .. }
            | Self::ParseConfig { .. }
            | Self::InvalidArgument { .. }
            | Self::Schema { .. } => ErrorKind::Configuration,
            Self::RecordParse { .. } | Self::InvalidRecord { .. } => ErrorKind::Validation,
            Self::Store { source, .. } => source.kind(),
            Self::Writer { source } => source.kind(),
            Self::Io { .. }
            | Self::JsonEncode { .. }
            | Self::TaskJoin { .. }
            | Self::Observability { .. } => ErrorKind::Internal,
        }
    }
}

pub type Result<T, E = CliError> = std::result::Result<T, E>;
