use data_model::{SurveyId, SurveyRecord, SurveyRecordBuilder};
use strum::AsRefStr;
use tracing::debug;

use crate::{
    driver::{Error as DriverError, Transaction},
    requests::{CreateSurveyRequest, DeleteSurveyRequest, UpdateSurveyRequest},
    serializer::{JsonEncode, JsonEncoder},
    Error,
    Result,
};

#[derive(AsRefStr, strum::Display, strum::EnumIter, Clone, Copy, Debug)]
pub enum SurveyColumns {
    Surveys,        //  SurveyId -> SurveyRecord
    SurveysByOwner, //  OwnerEmail|CreatedAt|SurveyId -> Empty
}

fn encode(record: &SurveyRecord) -> Result<Vec<u8>> {
    JsonEncoder::encode(record).map_err(|source| DriverError::JsonEncoderFailed { source }.into())
}

pub(crate) fn decode(bytes: &[u8]) -> Result<SurveyRecord> {
    JsonEncoder::decode(bytes).map_err(|source| DriverError::JsonDecoderFailed { source }.into())
}

fn read_for_update(txn: &Transaction, id: &SurveyId) -> Result<SurveyRecord> {
    let bytes = txn
        .get_for_update(SurveyColumns::Surveys, id.get())?
        .ok_or_else(|| Error::NotFound { id: id.clone() })?;
    decode(&bytes)
}

fn put_record(txn: &Transaction, record: &SurveyRecord) -> Result<()> {
    txn.put(SurveyColumns::Surveys, record.key(), encode(record)?)?;
    txn.put(SurveyColumns::SurveysByOwner, record.owner_index_key(), b"")?;
    Ok(())
}

pub(crate) fn create_survey(txn: &Transaction, req: &CreateSurveyRequest) -> Result<SurveyRecord> {
    let record = SurveyRecordBuilder::default()
        .owner_email(req.owner_email.clone())
        .fields(req.fields.clone())
        .image_ref(req.image_ref.clone())
        .build()?;
    put_record(txn, &record)?;
    debug!(id = %record.id, "created survey");
    Ok(record)
}

pub(crate) fn update_survey(txn: &Transaction, req: &UpdateSurveyRequest) -> Result<SurveyRecord> {
    let mut record = read_for_update(txn, &req.id)?;
    let previous_index_key = record.owner_index_key();
    record.apply(req.update.clone())?;
    if previous_index_key != record.owner_index_key() {
        txn.delete(SurveyColumns::SurveysByOwner, previous_index_key)?;
    }
    put_record(txn, &record)?;
    debug!(id = %record.id, "updated survey");
    Ok(record)
}

pub(crate) fn delete_survey(txn: &Transaction, req: &DeleteSurveyRequest) -> Result<SurveyRecord> {
    let record = read_for_update(txn, &req.id)?;
    txn.delete(SurveyColumns::Surveys, record.key())?;
    txn.delete(SurveyColumns::SurveysByOwner, record.owner_index_key())?;
    debug!(id = %record.id, "deleted survey");
    Ok(record)
}
