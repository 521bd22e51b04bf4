use std::sync::Arc;

use blob_store::{BlobStorage, StoredBlob};
use bytes::Bytes;
use futures::Stream;
use tracing::info;

use crate::error::{SurveyError, SurveyResult};

/// Multipart field carrying the survey image.
pub const IMAGE_FIELD: &str = "image";

pub struct UploadPipeline {
    blob_storage: Arc<BlobStorage>,
}

impl UploadPipeline {
    pub fn new(blob_storage: Arc<BlobStorage>) -> Self {
        Self { blob_storage }
    }

    /// Streams an inbound image part into the blob store. Returns once the
    /// blob is durable, so the caller may reference it from metadata.
    #[tracing::instrument(skip(self, data))]
    pub async fn run(
        &self,
        filename: Option<&str>,
        data: impl Stream<Item = anyhow::Result<Bytes>> + Send + Unpin,
    ) -> SurveyResult<StoredBlob> {
        let filename = filename
            .filter(|f| !f.trim().is_empty())
            .ok_or_else(|| SurveyError::validation("image part has no filename"))?;
        let stored = self.blob_storage.store(filename, data).await?;
        info!(
            blob = %stored.name,
            size_bytes = stored.size_bytes,
            sha256 = %stored.sha256_hash,
            "image uploaded"
        );
        Ok(stored)
    }
}
