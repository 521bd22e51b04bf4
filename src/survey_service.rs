use std::sync::Arc;

use blob_store::{BlobStorage, StoredBlob};
use bytes::Bytes;
use data_model::{SurveyFields, SurveyId, SurveyRecord, SurveyUpdate};
use futures::Stream;
use state_store::MetadataStore;
use tracing::{info, warn};

use crate::{
    error::{SurveyError, SurveyResult},
    pipelines::{DownloadPipeline, ImageDownload, UploadPipeline},
};

/// The image attached to a create or update request.
#[derive(Debug, Clone, Default)]
pub enum ImageInput {
    #[default]
    None,
    /// Bytes already streamed into the blob store by this request.
    Uploaded(StoredBlob),
    /// Name of a blob stored by an earlier upload.
    Existing(String),
}

#[derive(Debug, Clone, Default)]
pub struct SurveySubmission {
    pub owner_email: Option<String>,
    pub fields: SurveyFields,
}

/// Coordinates the blob store and the metadata store for every survey
/// operation. A blob is always durable before metadata refers to it.
pub struct SurveyService {
    metadata: Arc<MetadataStore>,
    blob_storage: Arc<BlobStorage>,
    uploads: UploadPipeline,
    downloads: DownloadPipeline,
}

impl SurveyService {
    pub fn new(metadata: Arc<MetadataStore>, blob_storage: Arc<BlobStorage>) -> Self {
        Self {
            uploads: UploadPipeline::new(blob_storage.clone()),
            downloads: DownloadPipeline::new(blob_storage.clone()),
            metadata,
            blob_storage,
        }
    }

    /// Stores an image on its own and returns the generated blob name.
    pub async fn upload_image(
        &self,
        filename: Option<&str>,
        data: impl Stream<Item = anyhow::Result<Bytes>> + Send + Unpin,
    ) -> SurveyResult<StoredBlob> {
        self.uploads.run(filename, data).await
    }

    /// Resolves the image input to the name the record will reference.
    async fn image_ref(&self, image: &ImageInput) -> SurveyResult<Option<String>> {
        match image {
            ImageInput::None => Ok(None),
            ImageInput::Uploaded(blob) => Ok(Some(blob.name.clone())),
            ImageInput::Existing(name) => {
                let exists = self.blob_storage.exists(name).await.map_err(|err| {
                    if err.is_invalid_input() {
                        SurveyError::validation(format!("invalid image reference: {err}"))
                    } else {
                        err.into()
                    }
                })?;
                if !exists {
                    return Err(SurveyError::validation(format!(
                        "referenced image {name} does not exist"
                    )));
                }
                Ok(Some(name.clone()))
            }
        }
    }

    #[tracing::instrument(skip(self, submission), fields(owner_email = submission.owner_email.as_deref()))]
    pub async fn create(
        &self,
        submission: SurveySubmission,
        image: ImageInput,
    ) -> SurveyResult<SurveyRecord> {
        let image_ref = self.image_ref(&image).await?;
        let owner_email = submission.owner_email.unwrap_or_default();
        let result = self
            .metadata
            .create(&owner_email, submission.fields, image_ref)
            .map_err(SurveyError::from);
        let record = warn_on_orphan(result, &image)?;
        info!(id = %record.id, image_ref = record.image_ref.as_deref(), "survey created");
        Ok(record)
    }

    pub fn list_by_owner(&self, owner_email: &str) -> SurveyResult<Vec<SurveyRecord>> {
        Ok(self.metadata.find_by_owner(owner_email)?)
    }

    pub fn get(&self, id: &SurveyId) -> SurveyResult<SurveyRecord> {
        Ok(self.metadata.find_by_id(id)?)
    }

    /// Merges the submission into the stored record. A superseded image
    /// stays in the blob store.
    #[tracing::instrument(skip(self, submission))]
    pub async fn update(
        &self,
        id: &SurveyId,
        submission: SurveySubmission,
        image: ImageInput,
    ) -> SurveyResult<SurveyRecord> {
        let image_ref = self.image_ref(&image).await?;
        let update = SurveyUpdate {
            owner_email: submission.owner_email,
            fields: submission.fields,
            image_ref,
        };
        let result = self.metadata.update(id, update).map_err(SurveyError::from);
        let record = warn_on_orphan(result, &image)?;
        info!(id = %record.id, image_ref = record.image_ref.as_deref(), "survey updated");
        Ok(record)
    }

    /// Deletes the record and returns the owner's remaining surveys. The
    /// caller's email selects the owner when given, otherwise the deleted
    /// record's owner is used.
    #[tracing::instrument(skip(self))]
    pub fn delete(
        &self,
        id: &SurveyId,
        owner_email: Option<&str>,
    ) -> SurveyResult<Vec<SurveyRecord>> {
        let removed = self.metadata.delete_by_id(id)?;
        info!(id = %removed.id, image_ref = removed.image_ref.as_deref(), "survey deleted");
        let owner_email = owner_email
            .map(str::trim)
            .filter(|email| !email.is_empty())
            .unwrap_or(removed.owner_email.as_str());
        self.list_by_owner(owner_email)
    }

    pub async fn fetch_image(&self, name: &str) -> SurveyResult<ImageDownload> {
        self.downloads.run(name).await
    }
}

/// Blobs are never removed, so a failed metadata write leaves a freshly
/// uploaded image unreferenced.
fn warn_on_orphan(
    result: SurveyResult<SurveyRecord>,
    image: &ImageInput,
) -> SurveyResult<SurveyRecord> {
    if let (Err(err), ImageInput::Uploaded(blob)) = (&result, image) {
        warn!(
            blob = %blob.name,
            size_bytes = blob.size_bytes,
            "metadata write failed after upload, image is orphaned: {}",
            err
        );
    }
    result
}
