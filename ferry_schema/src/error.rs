use snafu::Snafu;

/// Errors raised while building column descriptors and index mappings.
///
/// These are configuration errors: they are reported before any write
/// traffic reaches the store.
#[derive(Debug, Clone, Snafu)]
#[snafu(visibility(pub))]
pub enum SchemaError {
    #[snafu(display("column {column} must have a type"))]
    MissingType { column: String },
    #[snafu(display("column {column} has unsupported type {type_name}"))]
    UnsupportedType { column: String, type_name: String },
    #[snafu(display("column at position {position} must have a name"))]
    MissingName { position: usize },
    #[snafu(display("column {column} has an invalid {option} option: {message}"))]
    InvalidOption {
        column: String,
        option: &'static str,
        message: String,
    },
    #[snafu(display("invalid date format {format}: {message}"))]
    InvalidDateFormat { format: String, message: String },
    #[snafu(display("invalid time zone {name}"))]
    InvalidTimeZone { name: String },
    #[snafu(display("must have mappings"))]
    EmptyMapping,
}

pub type Result<T, E = SchemaError> = std::result::Result<T, E>;
