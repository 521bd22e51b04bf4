use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    Json,
};
use data_model::SurveyId;
use futures::StreamExt;
use serde_json::Value;
use tracing::warn;
use utoipa::ToSchema;

use super::RouteState;
use crate::{
    http_objects::{ApiStatus, DeleteSurveyParams, SurveyAPIError, SurveyList, SurveyResponse},
    pipelines::IMAGE_FIELD,
    survey_service::{ImageInput, SurveyService, SurveySubmission},
};

/// Multipart part naming the survey owner.
pub const OWNER_EMAIL_FIELD: &str = "email";

#[allow(dead_code)]
#[derive(ToSchema)]
struct SurveyForm {
    /// Owner of the survey. Required on create.
    email: Option<String>,
    /// A new image file, or the name returned by `/upload-image`.
    #[schema(format = "binary")]
    image: Option<String>,
    /// Every other text part is stored as a survey field.
    #[schema(value_type = Object)]
    fields: Option<Value>,
}

fn multipart_error(err: MultipartError) -> SurveyAPIError {
    SurveyAPIError::new(err.status(), ApiStatus::Failed, &err.body_text())
}

/// Reads a survey form. The image part, if any, is streamed into the blob
/// store as soon as it is reached, so it is durable before the metadata
/// write that follows.
pub(crate) async fn read_survey_form(
    surveys: &SurveyService,
    mut multipart: Multipart,
) -> Result<(SurveySubmission, ImageInput), SurveyAPIError> {
    let mut submission = SurveySubmission::default();
    let mut image = ImageInput::None;
    let result = read_parts(surveys, &mut multipart, &mut submission, &mut image).await;
    if let (Err(err), ImageInput::Uploaded(blob)) = (&result, &image) {
        warn!(
            blob = %blob.name,
            "survey form rejected after upload, image is orphaned: {:?}",
            err
        );
    }
    result.map(|_| (submission, image))
}

async fn read_parts(
    surveys: &SurveyService,
    multipart: &mut Multipart,
    submission: &mut SurveySubmission,
    image: &mut ImageInput,
) -> Result<(), SurveyAPIError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if name == IMAGE_FIELD {
            if !matches!(image, ImageInput::None) {
                return Err(SurveyAPIError::bad_request("only one image may be submitted"));
            }
            match field.file_name().map(str::to_string) {
                // Browsers send an empty file part when no file was chosen.
                Some(filename) if filename.is_empty() => continue,
                Some(filename) => {
                    let stream = field.map(|res| res.map_err(|err| anyhow::anyhow!(err)));
                    let stored = surveys.upload_image(Some(&filename), stream).await?;
                    *image = ImageInput::Uploaded(stored);
                }
                None => {
                    let text = field.text().await.map_err(multipart_error)?;
                    let text = text.trim();
                    if !text.is_empty() {
                        *image = ImageInput::Existing(text.to_string());
                    }
                }
            }
            continue;
        }

        if field.file_name().is_some() {
            return Err(SurveyAPIError::bad_request(&format!(
                "unexpected file in field {name}, images must be sent as \"{IMAGE_FIELD}\""
            )));
        }
        let text = field.text().await.map_err(multipart_error)?;
        if name == OWNER_EMAIL_FIELD {
            submission.owner_email = Some(text.trim().to_string());
        } else {
            submission.fields.insert(name, Value::String(text));
        }
    }
    Ok(())
}

/// Submit a survey
#[utoipa::path(
    post,
    path = "/survey",
    tag = "surveys",
    request_body(content_type = "multipart/form-data", content = inline(SurveyForm)),
    responses(
        (status = 200, description = "Survey created", body = SurveyResponse),
        (status = BAD_REQUEST, description = "Invalid survey", body = SurveyAPIError),
        (status = INTERNAL_SERVER_ERROR, description = "Unable to store survey", body = SurveyAPIError)
    ),
)]
pub async fn create_survey(
    State(state): State<RouteState>,
    multipart: Multipart,
) -> Result<Json<SurveyResponse>, SurveyAPIError> {
    let (submission, image) = read_survey_form(&state.surveys, multipart).await?;
    let record = state.surveys.create(submission, image).await?;
    Ok(Json(SurveyResponse::new(
        record,
        Some("survey created successfully"),
    )))
}

/// List the surveys of an owner
#[utoipa::path(
    get,
    path = "/surveys/{email}",
    tag = "surveys",
    params(("email" = String, Path, description = "Owner email")),
    responses(
        (status = 200, description = "Surveys of the owner, oldest first", body = SurveyList),
        (status = INTERNAL_SERVER_ERROR, description = "Internal Server Error", body = SurveyAPIError)
    ),
)]
pub async fn list_surveys(
    Path(email): Path<String>,
    State(state): State<RouteState>,
) -> Result<Json<SurveyList>, SurveyAPIError> {
    let surveys = state.surveys.list_by_owner(&email)?;
    Ok(Json(surveys.into()))
}

/// Get a survey
#[utoipa::path(
    get,
    path = "/survey/{id}",
    tag = "surveys",
    params(("id" = String, Path, description = "Survey id")),
    responses(
        (status = 200, description = "The survey", body = SurveyResponse),
        (status = NOT_FOUND, description = "Survey not found", body = SurveyAPIError)
    ),
)]
pub async fn get_survey(
    Path(id): Path<String>,
    State(state): State<RouteState>,
) -> Result<Json<SurveyResponse>, SurveyAPIError> {
    let record = state.surveys.get(&SurveyId::new(id))?;
    Ok(Json(SurveyResponse::new(record, None)))
}

/// Update a survey
#[utoipa::path(
    put,
    path = "/survey/{id}",
    tag = "surveys",
    params(("id" = String, Path, description = "Survey id")),
    request_body(content_type = "multipart/form-data", content = inline(SurveyForm)),
    responses(
        (status = 200, description = "Survey updated", body = SurveyResponse),
        (status = BAD_REQUEST, description = "Invalid survey", body = SurveyAPIError),
        (status = NOT_FOUND, description = "Survey not found", body = SurveyAPIError)
    ),
)]
pub async fn update_survey(
    Path(id): Path<String>,
    State(state): State<RouteState>,
    multipart: Multipart,
) -> Result<Json<SurveyResponse>, SurveyAPIError> {
    let (submission, image) = read_survey_form(&state.surveys, multipart).await?;
    let record = state
        .surveys
        .update(&SurveyId::new(id), submission, image)
        .await?;
    Ok(Json(SurveyResponse::new(
        record,
        Some("survey updated successfully"),
    )))
}

/// Delete a survey
///
/// The owner whose remaining surveys are returned may be given as an
/// `email` query parameter or in a JSON body.
#[utoipa::path(
    delete,
    path = "/survey/{id}",
    tag = "surveys",
    params(("id" = String, Path, description = "Survey id"), DeleteSurveyParams),
    request_body(content = DeleteSurveyParams, content_type = "application/json", description = "Optional owner of the surveys to return"),
    responses(
        (status = 200, description = "Remaining surveys of the owner", body = SurveyList),
        (status = NOT_FOUND, description = "Survey not found", body = SurveyAPIError)
    ),
)]
pub async fn delete_survey(
    Path(id): Path<String>,
    Query(params): Query<DeleteSurveyParams>,
    State(state): State<RouteState>,
    body: Bytes,
) -> Result<Json<SurveyList>, SurveyAPIError> {
    let body_params = if body.is_empty() {
        DeleteSurveyParams::default()
    } else {
        serde_json::from_slice::<DeleteSurveyParams>(&body)
            .map_err(|e| SurveyAPIError::bad_request(&format!("invalid delete body: {e}")))?
    };
    let owner_email = params.email.or(body_params.email);
    let remaining = state
        .surveys
        .delete(&SurveyId::new(id), owner_email.as_deref())?;
    Ok(Json(remaining.into()))
}
