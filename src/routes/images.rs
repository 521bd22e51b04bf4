use axum::{
    body::Body,
    extract::{Multipart, Path, State},
    http::{header, Response},
    Json,
};
use futures::StreamExt;

use super::RouteState;
use crate::{
    http_objects::{ApiStatus, SurveyAPIError, UploadedImage},
    pipelines::IMAGE_FIELD,
};

fn content_type_for(name: &str) -> String {
    mime_guess::from_path(name)
        .first()
        .filter(|mime| mime.type_() == mime_guess::mime::IMAGE)
        .map(|mime| mime.to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

/// Fetch an image
#[utoipa::path(
    get,
    path = "/image/{name}",
    tag = "surveys",
    params(("name" = String, Path, description = "Blob name returned when the image was stored")),
    responses(
        (status = 200, description = "Image bytes", content_type = "application/octet-stream"),
        (status = NOT_FOUND, description = "Image not found", body = SurveyAPIError)
    ),
)]
pub async fn fetch_image(
    Path(name): Path<String>,
    State(state): State<RouteState>,
) -> Result<Response<Body>, SurveyAPIError> {
    let download = state.surveys.fetch_image(&name).await?;
    Response::builder()
        .header(header::CONTENT_TYPE, content_type_for(&download.name))
        .header(header::CONTENT_LENGTH, download.size_bytes)
        .body(Body::from_stream(download.stream))
        .map_err(|e| SurveyAPIError::internal_error_str(&e.to_string()))
}

#[allow(dead_code)]
#[derive(utoipa::ToSchema)]
struct ImageForm {
    #[schema(format = "binary")]
    image: String,
}

/// Upload an image on its own
///
/// The returned filename can be sent as the `image` part of a later survey
/// submission.
#[utoipa::path(
    post,
    path = "/upload-image",
    tag = "surveys",
    request_body(content_type = "multipart/form-data", content = inline(ImageForm)),
    responses(
        (status = 200, description = "Image stored", body = UploadedImage),
        (status = BAD_REQUEST, description = "No image in the request", body = SurveyAPIError)
    ),
)]
pub async fn upload_image(
    State(state): State<RouteState>,
    mut multipart: Multipart,
) -> Result<Json<UploadedImage>, SurveyAPIError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| SurveyAPIError::new(e.status(), ApiStatus::Failed, &e.body_text()))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let filename = field.file_name().map(str::to_string);
        let stream = field.map(|res| res.map_err(|err| anyhow::anyhow!(err)));
        let stored = state
            .surveys
            .upload_image(filename.as_deref(), stream)
            .await?;
        return Ok(Json(UploadedImage {
            status: ApiStatus::Success,
            message: "image uploaded successfully".to_string(),
            filename: stored.name,
            size_bytes: stored.size_bytes,
            sha256_hash: stored.sha256_hash,
        }));
    }
    Err(SurveyAPIError::bad_request(&format!(
        "missing \"{IMAGE_FIELD}\" file part"
    )))
}

#[cfg(test)]
mod tests {
    use super::content_type_for;

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("1700000000000_cat.png"), "image/png");
        assert_eq!(content_type_for("1700000000000_cat.jpg"), "image/jpeg");
        assert_eq!(
            content_type_for("1700000000000_notes.txt"),
            "application/octet-stream"
        );
        assert_eq!(content_type_for("noextension"), "application/octet-stream");
    }
}
