use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use blob_store::BlobStorage;
use bytes::Bytes;
use futures::{stream::BoxStream, StreamExt, TryStreamExt};
use survey_utils::GuardStreamExt;
use tracing::{debug, error, warn};

use crate::error::{SurveyError, SurveyResult};

pub type ImageStream = BoxStream<'static, SurveyResult<Bytes>>;

/// An image ready to be relayed. Nothing has been read from the backend
/// beyond its metadata until `stream` is polled.
pub struct ImageDownload {
    pub name: String,
    pub size_bytes: u64,
    pub stream: ImageStream,
}

pub struct DownloadPipeline {
    blob_storage: Arc<BlobStorage>,
}

impl DownloadPipeline {
    pub fn new(blob_storage: Arc<BlobStorage>) -> Self {
        Self { blob_storage }
    }

    /// Opens `name` for streaming. A missing blob is reported here, before
    /// any byte is produced; later backend failures arrive as error items.
    #[tracing::instrument(skip(self))]
    pub async fn run(&self, name: &str) -> SurveyResult<ImageDownload> {
        let reader = self.blob_storage.open_read(name).await?;

        let relayed = Arc::new(AtomicU64::new(0));
        let counter = relayed.clone();
        let failed_name = reader.name.clone();
        let guard_name = reader.name.clone();
        let size_bytes = reader.size_bytes;
        let stream = reader
            .stream
            .inspect_ok(move |chunk| {
                counter.fetch_add(chunk.len() as u64, Ordering::Relaxed);
            })
            .inspect_err(move |err| {
                error!(blob = %failed_name, "image download failed mid-stream: {}", err);
            })
            .map_err(SurveyError::from)
            .guard(move |finished| {
                let relayed = relayed.load(Ordering::Relaxed);
                if finished {
                    debug!(blob = %guard_name, relayed, "image download finished");
                } else {
                    warn!(
                        blob = %guard_name,
                        relayed,
                        size_bytes,
                        "image download abandoned before completion"
                    );
                }
            })
            .boxed();

        Ok(ImageDownload {
            name: reader.name,
            size_bytes,
            stream,
        })
    }
}
