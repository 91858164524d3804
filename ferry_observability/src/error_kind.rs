/// Categories of errors for classification and handling.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad configuration, needs user fix
    Configuration,

    /// Invalid input or a request the store rejected
    Validation,

    /// Index or document missing
    NotFound,

    /// Resource exists, or the store rejected part of a bulk request
    Conflict,

    /// Network errors and overloaded stores, retry possible
    Temporary,

    /// Bugs, system errors
    Internal,
}

impl ErrorKind {
    /// Whether this error is retryable.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Temporary)
    }

    /// Standard exit code for this error category.
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Configuration => 78, // EX_CONFIG
            Self::Validation => 65,    // EX_DATAERR
            Self::Temporary => 75,     // EX_TEMPFAIL
            Self::NotFound => 66,      // EX_NOINPUT
            _ => 70,                   // EX_SOFTWARE
        }
    }

    /// Classifies an HTTP status returned by the store.
    pub fn from_status(status: u16) -> Self {
        match status {
            404 => Self::NotFound,
            409 => Self::Conflict,
            408 | 429 => Self::Temporary,
            500..=599 => Self::Temporary,
            400..=499 => Self::Validation,
            _ => Self::Internal,
        }
    }
}
