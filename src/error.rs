// src/error.rs
// Crate-wide error taxonomy shared by the job runtime and the data layer.

use thiserror::Error;

/// The four error kinds the job runtime understands when deciding a retry outcome.
///
/// See the job runtime's `classify` step in `jobs::runtime` for how each kind maps
/// onto a job state transition.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("transient: {0}")]
    Transient(String),

    #[error("permanent: {0}")]
    Permanent(String),

    #[error("cancelled")]
    Cancelled,

    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    pub fn permanent(msg: impl Into<String>) -> Self {
        Self::Permanent(msg.into())
    }

    /// Best-effort classification of an opaque `anyhow::Error` into one of the
    /// four kinds the job runtime understands. Defaults to `Transient`: a
    /// misclassified permanent error that gets retried is recoverable (it just
    /// burns an attempt); a misclassified permanent error that gets discarded
    /// immediately is not.
    pub fn classify(err: &anyhow::Error) -> CoreErrorKind {
        if let Some(core_err) = err.downcast_ref::<CoreError>() {
            return core_err.kind();
        }
        if let Some(sqlx::Error::RowNotFound) = err.downcast_ref::<sqlx::Error>() {
            return CoreErrorKind::NotFound;
        }
        CoreErrorKind::Transient
    }

    pub fn kind(&self) -> CoreErrorKind {
        match self {
            CoreError::NotFound(_) => CoreErrorKind::NotFound,
            CoreError::Transient(_) | CoreError::Db(_) | CoreError::Http(_) | CoreError::Io(_) => {
                CoreErrorKind::Transient
            }
            CoreError::Permanent(_) | CoreError::Json(_) => CoreErrorKind::Permanent,
            CoreError::Cancelled => CoreErrorKind::Cancelled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreErrorKind {
    NotFound,
    Transient,
    Permanent,
    Cancelled,
}

pub type CoreResult<T> = Result<T, CoreError>;

/// Tags an arbitrary `Result`'s error with one of the four kinds, the way
/// `IntoGitErrorResult` tags arbitrary errors with context in the git client.
pub trait IntoCoreError<T> {
    fn transient_ctx(self, context: &str) -> Result<T, CoreError>;
    fn permanent_ctx(self, context: &str) -> Result<T, CoreError>;
}

impl<T, E: std::fmt::Display> IntoCoreError<T> for Result<T, E> {
    fn transient_ctx(self, context: &str) -> Result<T, CoreError> {
        self.map_err(|e| CoreError::Transient(format!("{context}: {e}")))
    }

    fn permanent_ctx(self, context: &str) -> Result<T, CoreError> {
        self.map_err(|e| CoreError::Permanent(format!("{context}: {e}")))
    }
}
