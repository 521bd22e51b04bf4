use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::Method,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    http_objects::{
        ApiStatus,
        DeleteSurveyParams,
        Survey,
        SurveyAPIError,
        SurveyList,
        SurveyResponse,
        UploadedImage,
    },
    survey_service::SurveyService,
};

mod images;
mod surveys;

use images::{fetch_image, upload_image};
use surveys::{create_survey, delete_survey, get_survey, list_surveys, update_survey};

#[derive(OpenApi)]
#[openapi(
        paths(
            surveys::create_survey,
            surveys::list_surveys,
            surveys::get_survey,
            surveys::update_survey,
            surveys::delete_survey,
            images::fetch_image,
            images::upload_image,
        ),
        components(
            schemas(
                ApiStatus,
                DeleteSurveyParams,
                Survey,
                SurveyAPIError,
                SurveyList,
                SurveyResponse,
                UploadedImage,
            )
        ),
        tags(
            (name = "surveys", description = "Survey submission API")
        )
    )]
struct ApiDoc;

#[derive(Clone)]
pub struct RouteState {
    pub surveys: Arc<SurveyService>,
}

pub fn create_routes(route_state: RouteState, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        .merge(SwaggerUi::new("/docs/swagger").url("/docs/openapi.json", ApiDoc::openapi()))
        .route("/", get(index))
        .route("/survey", post(create_survey))
        .route("/surveys/{email}", get(list_surveys))
        .route(
            "/survey/{id}",
            get(get_survey).put(update_survey).delete(delete_survey),
        )
        .route("/image/{name}", get(fetch_image))
        .route("/upload-image", post(upload_image))
        .with_state(route_state)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

async fn index() -> &'static str {
    "Survey Server"
}
