pub mod tests {
    use serde_json::json;

    use crate::{SurveyFields, SurveyRecord, SurveyRecordBuilder};

    pub const TEST_OWNER_EMAIL: &str = "a@x.com";
    pub const TEST_OTHER_OWNER_EMAIL: &str = "b@x.com";

    pub fn mock_fields() -> SurveyFields {
        let mut fields = SurveyFields::new();
        fields.insert("q1".to_string(), json!("yes"));
        fields
    }

    pub fn mock_record(owner_email: &str, image_ref: Option<&str>) -> SurveyRecord {
        SurveyRecordBuilder::default()
            .owner_email(owner_email.to_string())
            .fields(mock_fields())
            .image_ref(image_ref.map(str::to_string))
            .build()
            .unwrap()
    }
}
