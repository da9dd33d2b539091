use thiserror::Error;

/// Centralized error types for the application
///
/// Request-time failures are turned into HTTP responses by the web layer;
/// failures after a download was scheduled travel as `error` progress events.
///
/// # Example
///
/// ```no_run
/// use vidfetch::core::error::AppError;
///
/// fn handle_error(err: AppError) {
///     eprintln!("Error: {}", err);
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// Video info lookup failed (bad URL, provider unreachable, no formats)
    #[error("Failed to extract video info: {0}")]
    Extraction(String),

    /// A download with this id is still running or paused
    #[error("Download id '{0}' is already in progress")]
    DuplicateSession(String),

    /// No download is registered under this id
    #[error("Unknown download id '{0}'")]
    UnknownSession(String),

    /// Toggle action other than pause/resume
    #[error("Unknown action '{0}'")]
    UnknownAction(String),

    /// Missing conversion tool or unusable destination
    #[error("{0}")]
    PreconditionFailed(String),

    /// Transfer or output verification failed
    #[error("Download failed: {0}")]
    Transfer(String),

    /// Bad request input
    #[error("{0}")]
    Validation(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Anyhow errors (for general error handling)
    #[error("Application error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

impl AppError {
    /// Short label used for metrics and logs
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Extraction(_) => "extraction",
            AppError::DuplicateSession(_) => "duplicate_session",
            AppError::UnknownSession(_) => "unknown_session",
            AppError::UnknownAction(_) => "unknown_action",
            AppError::PreconditionFailed(_) => "precondition",
            AppError::Transfer(_) => "transfer",
            AppError::Validation(_) => "validation",
            AppError::Io(_) => "io",
            AppError::Anyhow(_) => "other",
        }
    }
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;
