use thiserror::Error;

/// Application-wide result type alias.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// I/O errors from filesystem operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No terminal session, or the backend does not know the session id.
    #[error("Session error: {0}")]
    Session(String),

    /// Terminal initialization or rendering errors.
    #[error("Terminal error: {0}")]
    Terminal(String),

    /// Invalid path provided by the user.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// A file could not be analyzed.
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// JSON serialization failure in headless output.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// Whether this error means there is no usable session.
    pub fn is_session(&self) -> bool {
        matches!(self, AppError::Session(_))
    }
}
