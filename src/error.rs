use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;

/// Reasons a submission is refused before or while being recorded
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Task already solved. Resubmission is not available.")]
    AlreadySolved,

    #[error(
        "A task must have at least {required} test cases before accepting submissions. Currently: {actual}"
    )]
    InsufficientTestCases { actual: u32, required: u32 },

    #[error("storage failure: {0}")]
    Storage(#[from] sqlx::Error),
}

/// Errors reported by the HTTP layer
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("storage failure: {0}")]
    External(#[from] sqlx::Error),
}

impl From<SubmitError> for ApiError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::Validation(msg) => Self::InvalidArgument(msg),
            SubmitError::NotFound(msg) => Self::NotFound(msg),
            e @ (SubmitError::AlreadySolved | SubmitError::InsufficientTestCases { .. }) => {
                Self::InvalidState(e.to_string())
            }
            SubmitError::Storage(e) => Self::External(e),
        }
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub reason: &'static str,
    pub code: u32,
    pub message: String,
}

impl ApiError {
    pub fn reason(&self) -> (&'static str, u32) {
        match self {
            Self::InvalidArgument(_) => ("ERR_INVALID_ARGUMENT", 1),
            Self::InvalidState(_) => ("ERR_INVALID_STATE", 2),
            Self::NotFound(_) => ("ERR_NOT_FOUND", 3),
            Self::Unauthorized => ("ERR_UNAUTHORIZED", 4),
            Self::External(_) => ("ERR_EXTERNAL", 5),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidArgument(_) | Self::InvalidState(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::External(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let (reason, code) = self.reason();
        let message = match self {
            Self::External(e) => {
                log::error!("Storage failure while serving request: {e}");
                "Internal storage error".to_string()
            }
            other => other.to_string(),
        };

        HttpResponse::build(self.status_code()).json(ErrorResponse {
            reason,
            code,
            message,
        })
    }
}
