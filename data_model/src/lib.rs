pub mod test_objects;

use std::fmt::{self, Display};

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use survey_utils::get_epoch_time_in_ms;

/// Submitted survey answers. Any JSON value is accepted per key.
pub type SurveyFields = serde_json::Map<String, serde_json::Value>;

/// Names a submission may not use as a field key, since they name the
/// record's own attributes.
pub const RESERVED_FIELD_NAMES: [&str; 7] = [
    "id",
    "email",
    "owner_email",
    "image",
    "image_ref",
    "created_at",
    "updated_at",
];

const KEY_SEPARATOR: char = '|';

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("owner email is required")]
    MissingOwnerEmail,

    #[error("owner email {0:?} contains an invalid character")]
    InvalidOwnerEmail(String),

    #[error("field names must not be empty")]
    EmptyFieldName,

    #[error("field name {0:?} is reserved")]
    ReservedFieldName(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SurveyId(String);

impl SurveyId {
    pub fn new(id: String) -> Self {
        Self(id)
    }

    pub fn generate() -> Self {
        Self(nanoid::nanoid!())
    }

    pub fn get(&self) -> &str {
        &self.0
    }
}

impl Display for SurveyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SurveyId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

pub fn validate_owner_email(owner_email: &str) -> Result<(), ValidationError> {
    if owner_email.trim().is_empty() {
        return Err(ValidationError::MissingOwnerEmail);
    }
    if owner_email.contains(KEY_SEPARATOR) {
        return Err(ValidationError::InvalidOwnerEmail(owner_email.to_string()));
    }
    Ok(())
}

pub fn validate_fields(fields: &SurveyFields) -> Result<(), ValidationError> {
    for name in fields.keys() {
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyFieldName);
        }
        if RESERVED_FIELD_NAMES.contains(&name.as_str()) {
            return Err(ValidationError::ReservedFieldName(name.clone()));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Builder)]
#[builder(build_fn(skip))]
pub struct SurveyRecord {
    pub id: SurveyId,
    pub owner_email: String,
    #[serde(default)]
    pub fields: SurveyFields,
    /// Name of the blob holding the submitted image, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
    pub created_at: u64,
    pub updated_at: u64,
}

impl SurveyRecord {
    pub fn key(&self) -> String {
        self.id.get().to_string()
    }

    /// Secondary index entry; ordered by creation time within an owner.
    pub fn owner_index_key(&self) -> String {
        format!(
            "{}{}{:020}{}{}",
            self.owner_email, KEY_SEPARATOR, self.created_at, KEY_SEPARATOR, self.id
        )
    }

    pub fn owner_index_prefix(owner_email: &str) -> String {
        format!("{}{}", owner_email, KEY_SEPARATOR)
    }

    /// Applies an update in place. Fields are merged key by key.
    pub fn apply(&mut self, update: SurveyUpdate) -> Result<(), ValidationError> {
        validate_fields(&update.fields)?;
        if let Some(owner_email) = update.owner_email {
            validate_owner_email(&owner_email)?;
            self.owner_email = owner_email;
        }
        self.fields.extend(update.fields);
        if let Some(image_ref) = update.image_ref {
            self.image_ref = Some(image_ref);
        }
        self.updated_at = get_epoch_time_in_ms().max(self.created_at);
        Ok(())
    }
}

impl SurveyRecordBuilder {
    pub fn build(&self) -> Result<SurveyRecord, ValidationError> {
        let owner_email = self
            .owner_email
            .clone()
            .ok_or(ValidationError::MissingOwnerEmail)?;
        validate_owner_email(&owner_email)?;
        let fields = self.fields.clone().unwrap_or_default();
        validate_fields(&fields)?;
        let created_at = get_epoch_time_in_ms();
        Ok(SurveyRecord {
            id: self.id.clone().unwrap_or_else(SurveyId::generate),
            owner_email,
            fields,
            image_ref: self.image_ref.clone().flatten(),
            created_at,
            updated_at: created_at,
        })
    }
}

/// Partial update of a record. Only the supplied parts change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SurveyUpdate {
    pub owner_email: Option<String>,
    pub fields: SurveyFields,
    pub image_ref: Option<String>,
}
