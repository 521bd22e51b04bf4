use std::sync::Arc;

use data_model::{SurveyId, SurveyRecord};
use tracing::warn;

use crate::{
    driver::{rocksdb::RocksDBDriver, IterOptions, Reader},
    state_machine::{decode, SurveyColumns},
    Result,
};

pub struct StateReader {
    db: Arc<RocksDBDriver>,
}

impl StateReader {
    pub fn new(db: Arc<RocksDBDriver>) -> Self {
        Self { db }
    }

    pub fn get_survey(&self, id: &SurveyId) -> Result<Option<SurveyRecord>> {
        self.db
            .get(SurveyColumns::Surveys, id.get())?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    /// Returns the owner's surveys, oldest first.
    pub fn list_surveys_by_owner(&self, owner_email: &str) -> Result<Vec<SurveyRecord>> {
        let prefix = SurveyRecord::owner_index_prefix(owner_email);
        let mut surveys = Vec::new();
        for kv in self.db.iter_prefix(
            SurveyColumns::SurveysByOwner,
            prefix.as_bytes(),
            IterOptions::default(),
        ) {
            let (key, _) = kv?;
            let Some(id) = survey_id_from_index_key(&key) else {
                warn!(
                    "malformed owner index key: {}",
                    String::from_utf8_lossy(&key)
                );
                continue;
            };
            // A concurrent delete may remove the record between reads.
            match self.get_survey(&id)? {
                Some(survey) => surveys.push(survey),
                None => warn!(id = %id, "owner index points at a missing survey"),
            }
        }
        Ok(surveys)
    }
}

fn survey_id_from_index_key(key: &[u8]) -> Option<SurveyId> {
    let key = std::str::from_utf8(key).ok()?;
    let (_, id) = key.rsplit_once('|')?;
    Some(SurveyId::from(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_survey_id_from_index_key() {
        let id = survey_id_from_index_key(b"a@x.com|00000000000000000042|V1StGXR8_Z5jdHi6B-myT");
        assert_eq!(id, Some(SurveyId::from("V1StGXR8_Z5jdHi6B-myT")));
        assert_eq!(survey_id_from_index_key(b"no-separator"), None);
    }
}
