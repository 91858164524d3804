use ferry_observability::ErrorKind;
use reqwest::StatusCode;
use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StoreError {
    #[snafu(display("Invalid endpoint {endpoint}: {message}"))]
    InvalidEndpoint { endpoint: String, message: String },
    #[snafu(display("Failed to build HTTP client"))]
    Client { source: reqwest::Error },
    #[snafu(display("Request failed: {operation}"))]
    Request {
        operation: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("Store rejected {operation}: status={status}, message={message}"))]
    Response {
        operation: &'static str,
        status: StatusCode,
        message: String,
    },
    #[snafu(display("Failed to decode {operation} response"))]
    Decode {
        operation: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("Failed to encode bulk request"))]
    Encode { source: serde_json::Error },
    #[snafu(display("Index {index} not found"))]
    IndexNotFound { index: String },
    #[snafu(display("Index {index} already exists"))]
    IndexAlreadyExists { index: String },
    #[snafu(display("Store unavailable during {operation}: {message}"))]
    Unavailable {
        operation: &'static str,
        message: String,
    },
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidEndpoint { .. } | Self::Client { .. } => ErrorKind::Configuration,
            Self::Request { source, .. } => match source.status() {
                Some(status) => ErrorKind::from_status(status.as_u16()),
                None if source.is_builder() => ErrorKind::Configuration,
                None if source.is_decode() => ErrorKind::Internal,
                None => ErrorKind::Temporary,
            },
            Self::Response { status, .. } => ErrorKind::from_status(status.as_u16()),
            Self::Decode { .. } | Self::Encode { .. } => ErrorKind::Internal,
            Self::IndexNotFound { .. } => ErrorKind::NotFound,
            Self::IndexAlreadyExists { .. } => ErrorKind::Conflict,
            Self::Unavailable { .. } => ErrorKind::Temporary,
        }
    }
}
