use axum::{extract::multipart::MultipartError, http::StatusCode};
use blob_store::BlobError;

pub type SurveyResult<T> = Result<T, SurveyError>;

/// Failures surfaced by survey operations, grouped by how the caller
/// should react to them.
#[derive(Debug, thiserror::Error)]
pub enum SurveyError {
    /// The request is malformed or violates a structural constraint.
    #[error("{message}")]
    Validation { message: String },

    #[error("{message}")]
    NotFound { message: String },

    /// The request body went over the configured upload limit.
    #[error("{message}")]
    PayloadTooLarge { message: String },

    /// A blob or metadata backend failed.
    #[error("storage failure: {source}")]
    Storage { source: anyhow::Error },

    #[error("server error: {source}")]
    Server { source: anyhow::Error },
}

impl SurveyError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

/// True when an upload stream was cut off by the request body limit.
fn is_over_body_limit(source: &anyhow::Error) -> bool {
    source
        .downcast_ref::<MultipartError>()
        .is_some_and(|err| err.status() == StatusCode::PAYLOAD_TOO_LARGE)
}

impl From<BlobError> for SurveyError {
    fn from(err: BlobError) -> Self {
        match err {
            BlobError::NotFound { .. } => Self::not_found(err.to_string()),
            BlobError::UploadInterrupted { ref source, .. } if is_over_body_limit(source) => {
                Self::PayloadTooLarge {
                    message: err.to_string(),
                }
            }
            BlobError::InvalidName { .. } => Self::validation(err.to_string()),
            BlobError::InvalidConfig { .. } => Self::Server { source: err.into() },
            _ => Self::Storage { source: err.into() },
        }
    }
}

impl From<state_store::Error> for SurveyError {
    fn from(err: state_store::Error) -> Self {
        match err {
            state_store::Error::NotFound { .. } => Self::not_found(err.to_string()),
            state_store::Error::Validation { .. } => Self::validation(err.to_string()),
            state_store::Error::CreateDirFailed { .. } => Self::Server { source: err.into() },
            state_store::Error::Driver { .. } => Self::Storage { source: err.into() },
        }
    }
}
