use axum::http::StatusCode;

/// Invalid frequency rule or activity shape supplied by a caller.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RuleError {
    #[error("isRepeatedEvery must be a positive integer, got {0}")]
    NonPositiveInterval(i64),
    #[error("specific frequency needs at least one weekday in isRepeatedOn")]
    EmptyWeekdays,
    #[error("recurring activity is missing a start date")]
    MissingStartDate,
    #[error("recurring activity is missing a frequency")]
    MissingFrequency,
    #[error("single task is missing a due date")]
    MissingDueDate,
}

/// Failure of the key-value persistence collaborator.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage access failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed stored data: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn internal(err: impl std::error::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

impl From<RuleError> for AppError {
    fn from(err: RuleError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        Self::internal(err)
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        (self.status, self.message).into_response()
    }
}
