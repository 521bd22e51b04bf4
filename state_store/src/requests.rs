use data_model::{SurveyFields, SurveyId, SurveyUpdate};

pub struct StateMachineUpdateRequest {
    pub payload: RequestPayload,
}

#[derive(Debug, Clone, strum::Display)]
pub enum RequestPayload {
    CreateSurvey(CreateSurveyRequest),
    UpdateSurvey(UpdateSurveyRequest),
    DeleteSurvey(DeleteSurveyRequest),
}

#[derive(Debug, Clone)]
pub struct CreateSurveyRequest {
    pub owner_email: String,
    pub fields: SurveyFields,
    pub image_ref: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UpdateSurveyRequest {
    pub id: SurveyId,
    pub update: SurveyUpdate,
}

#[derive(Debug, Clone)]
pub struct DeleteSurveyRequest {
    pub id: SurveyId,
}
