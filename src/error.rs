use thiserror::Error;

/// Failures raised while talking to the payment gateway.
///
/// None of these mutate persisted payment state; callers report them and the
/// payment (if any) stays pending so it can be verified again later.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("gateway transport error: {0}")]
    Transport(String),
    #[error("gateway request timed out")]
    Timeout,
    #[error("gateway rejected request: {message}")]
    Rejected { message: String },
    #[error("gateway response could not be decoded: {0}")]
    Parse(String),
}

#[derive(Error, Debug)]
pub enum VoteError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VoteError {
    /// Builds a validation error from a list of `(field, problem)` pairs.
    pub fn fields<I, F, M>(errors: I) -> Self
    where
        I: IntoIterator<Item = (F, M)>,
        F: std::fmt::Display,
        M: std::fmt::Display,
    {
        let joined = errors
            .into_iter()
            .map(|(field, message)| format!("{field}: {message}"))
            .collect::<Vec<_>>()
            .join("; ");
        Self::Validation(joined)
    }

    /// Transient failures: the operation may succeed if retried unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Gateway(_) | Self::Persistence(_))
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for VoteError {
    fn from(err: rocksdb::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, VoteError>;
