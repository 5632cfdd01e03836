use thiserror::Error;

pub mod bridge;

pub type Result<T> = std::result::Result<T, Error>;

pub use bridge::{ErrorBridge, ErrorLevel, ProcessErrorState};

/// Main error type for the trellis request-handling core
#[derive(Error, Debug)]
pub enum Error {
    /// Bad registration or wiring: unknown controller/middleware identifier,
    /// unwritable cache directory, missing final response. Always fatal for
    /// the current dispatch, never retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid argument at registration time (empty method list, empty target)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A runtime fault intercepted by the error bridge in strict mode,
    /// carrying the formatted message and the numeric severity code
    #[error("{message}")]
    RuntimeTrap { message: String, code: i32 },

    #[error("View error: {0}")]
    View(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn view(msg: impl Into<String>) -> Self {
        Self::View(msg.into())
    }

    /// Get error code for log correlation
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Configuration(_) => "E_CONFIGURATION",
            Error::InvalidArgument(_) => "E_INVALID_ARGUMENT",
            Error::RuntimeTrap { .. } => "E_RUNTIME_TRAP",
            Error::View(_) => "E_VIEW",
            Error::Json(_) => "E_JSON",
            Error::Io(_) => "E_IO",
        }
    }

    /// Get HTTP status code for the error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::InvalidArgument(_) => 400,
            _ => 500,
        }
    }
}
