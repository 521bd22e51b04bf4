use std::{fs, path::PathBuf, sync::Arc};

use data_model::{SurveyFields, SurveyId, SurveyRecord, SurveyUpdate, ValidationError};
use driver::{rocksdb::RocksDBDriver, ConnectionOptions, Writer};
use requests::{
    CreateSurveyRequest,
    DeleteSurveyRequest,
    RequestPayload,
    StateMachineUpdateRequest,
    UpdateSurveyRequest,
};
use rocksdb::{ColumnFamilyDescriptor, Options};
use scanner::StateReader;
use state_machine::SurveyColumns;
use strum::IntoEnumIterator;
use tracing::{debug, info};

pub mod driver;
pub mod requests;
pub mod scanner;
pub mod serializer;
pub mod state_machine;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("survey not found: {id}")]
    NotFound { id: SurveyId },

    #[error("invalid survey: {source}")]
    Validation {
        #[from]
        source: ValidationError,
    },

    #[error("failed to create state store dir {path}: {source}")]
    CreateDirFailed {
        path: String,
        source: std::io::Error,
    },

    #[error(transparent)]
    Driver {
        #[from]
        source: driver::Error,
    },
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The survey collection. Every write runs in a single transaction, so
/// the record and its owner index entry change together.
pub struct MetadataStore {
    db: Arc<RocksDBDriver>,
}

impl MetadataStore {
    pub fn new(path: PathBuf) -> Result<Arc<Self>> {
        fs::create_dir_all(&path).map_err(|source| Error::CreateDirFailed {
            path: path.display().to_string(),
            source,
        })?;

        let column_families = SurveyColumns::iter()
            .map(|cf| ColumnFamilyDescriptor::new(cf.to_string(), Options::default()))
            .collect();
        let db = driver::open_database(ConnectionOptions::RocksDB(driver::rocksdb::Options {
            path: path.clone(),
            column_families,
        }))?;

        info!("initialized metadata store at {}", path.display());
        Ok(Arc::new(Self { db: Arc::new(db) }))
    }

    pub fn reader(&self) -> StateReader {
        StateReader::new(self.db.clone())
    }

    #[tracing::instrument(
        skip(self, request),
        fields(
            request_type = request.payload.to_string(),
        )
    )]
    pub fn write(&self, request: StateMachineUpdateRequest) -> Result<SurveyRecord> {
        debug!("writing state machine update request");
        let txn = self.db.transaction();
        let record = match &request.payload {
            RequestPayload::CreateSurvey(req) => state_machine::create_survey(&txn, req)?,
            RequestPayload::UpdateSurvey(req) => state_machine::update_survey(&txn, req)?,
            RequestPayload::DeleteSurvey(req) => state_machine::delete_survey(&txn, req)?,
        };
        txn.commit()?;
        Ok(record)
    }

    pub fn create(
        &self,
        owner_email: &str,
        fields: SurveyFields,
        image_ref: Option<String>,
    ) -> Result<SurveyRecord> {
        self.write(StateMachineUpdateRequest {
            payload: RequestPayload::CreateSurvey(CreateSurveyRequest {
                owner_email: owner_email.to_string(),
                fields,
                image_ref,
            }),
        })
    }

    pub fn find_by_id(&self, id: &SurveyId) -> Result<SurveyRecord> {
        self.reader()
            .get_survey(id)?
            .ok_or_else(|| Error::NotFound { id: id.clone() })
    }

    pub fn find_by_owner(&self, owner_email: &str) -> Result<Vec<SurveyRecord>> {
        self.reader().list_surveys_by_owner(owner_email)
    }

    pub fn update(&self, id: &SurveyId, update: SurveyUpdate) -> Result<SurveyRecord> {
        self.write(StateMachineUpdateRequest {
            payload: RequestPayload::UpdateSurvey(UpdateSurveyRequest {
                id: id.clone(),
                update,
            }),
        })
    }

    /// Removes the record and returns it. Blobs it referenced are untouched.
    pub fn delete_by_id(&self, id: &SurveyId) -> Result<SurveyRecord> {
        self.write(StateMachineUpdateRequest {
            payload: RequestPayload::DeleteSurvey(DeleteSurveyRequest { id: id.clone() }),
        })
    }
}
