use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use data_model::{SurveyFields, SurveyRecord};
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::{IntoParams, ToSchema};

use crate::error::SurveyError;

/// Outcome reported in every JSON response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum ApiStatus {
    Success,
    Failed,
    #[serde(rename = "Server Error")]
    ServerError,
}

#[derive(Debug, ToSchema, Serialize, Deserialize)]
pub struct SurveyAPIError {
    #[serde(skip)]
    status_code: StatusCode,
    status: ApiStatus,
    message: String,
}

impl SurveyAPIError {
    pub fn new(status_code: StatusCode, status: ApiStatus, message: &str) -> Self {
        Self {
            status_code,
            status,
            message: message.to_string(),
        }
    }

    pub fn bad_request(message: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, ApiStatus::Failed, message)
    }

    pub fn not_found(message: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, ApiStatus::Failed, message)
    }

    pub fn internal_error_str(e: &str) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, ApiStatus::ServerError, e)
    }

    pub fn status_code(&self) -> StatusCode {
        self.status_code
    }
}

impl IntoResponse for SurveyAPIError {
    fn into_response(self) -> Response {
        if self.status_code.is_server_error() {
            error!("API Error: {} - {}", self.status_code, self.message);
        } else {
            tracing::debug!("API Error: {} - {}", self.status_code, self.message);
        }
        (self.status_code, Json(self)).into_response()
    }
}

impl From<SurveyError> for SurveyAPIError {
    fn from(err: SurveyError) -> Self {
        let message = err.to_string();
        match err {
            SurveyError::Validation { .. } => Self::bad_request(&message),
            SurveyError::NotFound { .. } => Self::not_found(&message),
            SurveyError::PayloadTooLarge { .. } => {
                Self::new(StatusCode::PAYLOAD_TOO_LARGE, ApiStatus::Failed, &message)
            }
            SurveyError::Storage { .. } => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiStatus::Failed,
                &message,
            ),
            SurveyError::Server { .. } => Self::internal_error_str(&message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Survey {
    pub id: String,
    pub email: String,
    #[schema(value_type = Object)]
    pub fields: SurveyFields,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
    pub created_at: u64,
    pub updated_at: u64,
}

impl From<SurveyRecord> for Survey {
    fn from(record: SurveyRecord) -> Self {
        Self {
            id: record.id.to_string(),
            email: record.owner_email,
            fields: record.fields,
            image_ref: record.image_ref,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SurveyResponse {
    pub status: ApiStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub result: Survey,
}

impl SurveyResponse {
    pub fn new(record: SurveyRecord, message: Option<&str>) -> Self {
        Self {
            status: ApiStatus::Success,
            message: message.map(str::to_string),
            result: record.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SurveyList {
    pub status: ApiStatus,
    pub result: Vec<Survey>,
}

impl From<Vec<SurveyRecord>> for SurveyList {
    fn from(records: Vec<SurveyRecord>) -> Self {
        Self {
            status: ApiStatus::Success,
            result: records.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UploadedImage {
    pub status: ApiStatus,
    pub message: String,
    pub filename: String,
    pub size_bytes: u64,
    pub sha256_hash: String,
}

/// Optional body of a delete request naming the owner whose remaining
/// surveys are returned.
#[derive(Debug, Default, Serialize, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DeleteSurveyParams {
    pub email: Option<String>,
}
