use std::{
    collections::HashSet,
    env,
    fmt::Debug,
    path::PathBuf,
    sync::{Arc, Mutex, PoisonError},
};

use bytes::{Bytes, BytesMut};
use futures::{stream::BoxStream, Stream, StreamExt, TryStreamExt};
use object_store::{
    aws::{AmazonS3Builder, AmazonS3ConfigKey},
    parse_url,
    path::Path,
    ObjectStore,
    ObjectStoreScheme,
    WriteMultipart,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use survey_utils::get_epoch_time_in_ms;
use tracing::{debug, info, warn};
use url::Url;

mod error;
pub mod name;
pub mod test_objects;

pub use error::{BlobError, BlobResult};

/// How many timestamps are tried before giving up on finding a free name.
const MAX_NAME_ATTEMPTS: usize = 16;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobStorageConfig {
    /// Any URL understood by `object_store`: `file://`, `s3://`, `memory://`.
    pub path: String,
    /// Logical partition every survey image is written under.
    #[serde(default = "default_bucket")]
    pub bucket: String,
}

impl BlobStorageConfig {
    pub fn new(path: &str, bucket: &str) -> Self {
        BlobStorageConfig {
            path: format!("file://{}", path),
            bucket: bucket.to_string(),
        }
    }

    pub fn in_memory() -> Self {
        BlobStorageConfig {
            path: "memory:///".to_string(),
            bucket: default_bucket(),
        }
    }
}

pub fn default_bucket() -> String {
    "survey_images".to_string()
}

impl Default for BlobStorageConfig {
    fn default() -> Self {
        let blob_store_path = env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join("survey_storage/blobs");
        let blob_store_path = format!("file://{}", blob_store_path.display());
        info!("using blob store path: {}", blob_store_path);
        BlobStorageConfig {
            path: blob_store_path,
            bucket: default_bucket(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub name: String,
    pub size_bytes: u64,
    pub sha256_hash: String,
}

pub type BlobStream = BoxStream<'static, BlobResult<Bytes>>;

/// An opened blob. Chunks are pulled from the backend as `stream` is polled.
pub struct BlobReader {
    pub name: String,
    pub size_bytes: u64,
    pub stream: BlobStream,
}

impl Debug for BlobReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobReader")
            .field("name", &self.name)
            .field("size_bytes", &self.size_bytes)
            .finish()
    }
}

/// Names handed out to uploads that are still being written. The backend
/// only sees a name once its upload completes, so concurrent uploads check
/// here before probing the store.
type ClaimedNames = Arc<Mutex<HashSet<String>>>;

/// Reservation of a blob name, released when dropped.
struct NameClaim {
    name: String,
    claimed: ClaimedNames,
}

impl NameClaim {
    fn acquire(claimed: &ClaimedNames, name: &str) -> Option<Self> {
        let mut names = claimed.lock().unwrap_or_else(PoisonError::into_inner);
        names.insert(name.to_string()).then(|| NameClaim {
            name: name.to_string(),
            claimed: claimed.clone(),
        })
    }
}

impl Drop for NameClaim {
    fn drop(&mut self) {
        self.claimed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.name);
    }
}

#[derive(Clone)]
pub struct BlobStorage {
    object_store: Arc<dyn ObjectStore>,
    path: Path,
    bucket: String,
    claimed: ClaimedNames,
}

impl BlobStorage {
    pub fn new(config: BlobStorageConfig) -> BlobResult<Self> {
        let (object_store, path) = Self::build_object_store(&config.path)?;
        Self::with_object_store(Arc::from(object_store), path, &config.bucket).map_err(|_| {
            BlobError::InvalidConfig {
                url: config.path.clone(),
                reason: format!("invalid bucket name {:?}", config.bucket),
            }
        })
    }

    /// Storage on top of an already built backend, rooted at `path`.
    pub fn with_object_store(
        object_store: Arc<dyn ObjectStore>,
        path: Path,
        bucket: &str,
    ) -> BlobResult<Self> {
        name::validate_blob_name(bucket)?;
        Ok(Self {
            object_store,
            path,
            bucket: bucket.to_string(),
            claimed: Default::default(),
        })
    }

    pub fn build_object_store(url_str: &str) -> BlobResult<(Box<dyn ObjectStore>, Path)> {
        let invalid = |reason: String| BlobError::InvalidConfig {
            url: url_str.to_string(),
            reason,
        };
        let url = url_str
            .parse::<Url>()
            .map_err(|e| invalid(e.to_string()))?;
        let (scheme, path) = ObjectStoreScheme::parse(&url).map_err(|e| invalid(e.to_string()))?;
        match scheme {
            ObjectStoreScheme::AmazonS3 => {
                // inject AWS environment variables to prioritize keys over instance metadata
                // credentials.
                let opts: Vec<(AmazonS3ConfigKey, String)> = env::vars_os()
                    .filter_map(|(os_key, os_value)| {
                        let (key, value) = (os_key.to_str()?, os_value.to_str()?);
                        if !key.starts_with("AWS_") {
                            return None;
                        }
                        let config_key = key.to_ascii_lowercase().parse().ok()?;
                        Some((config_key, String::from(value)))
                    })
                    .collect();

                let mut s3_builder = AmazonS3Builder::new().with_url(url_str);
                for (key, value) in opts.iter() {
                    s3_builder = s3_builder.with_config(*key, value.clone());
                }
                let s3 = s3_builder.build()?;
                Ok((Box::new(s3), path))
            }
            _ => Ok(parse_url(&url)?),
        }
    }

    fn blob_path(&self, name: &str) -> Path {
        self.path.child(self.bucket.as_str()).child(name)
    }

    /// Metadata-only probe for a blob.
    pub async fn exists(&self, name: &str) -> BlobResult<bool> {
        name::validate_blob_name(name)?;
        match self.object_store.head(&self.blob_path(name)).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn unused_name(&self, original_filename: &str) -> BlobResult<NameClaim> {
        let filename = name::sanitize_filename(original_filename)?;
        let mut timestamp = get_epoch_time_in_ms();
        for _ in 0..MAX_NAME_ATTEMPTS {
            let candidate = name::blob_name(timestamp, filename);
            if let Some(claim) = NameClaim::acquire(&self.claimed, &candidate) {
                if !self.exists(&candidate).await? {
                    return Ok(claim);
                }
            }
            debug!(blob = %candidate, "blob name already taken, advancing timestamp");
            timestamp += 1;
        }
        Err(BlobError::NameExhausted {
            filename: filename.to_string(),
            attempts: MAX_NAME_ATTEMPTS,
        })
    }

    /// Writes the stream to completion under a freshly generated name.
    ///
    /// The blob only becomes visible once every chunk has been written; on
    /// failure the multipart upload is aborted.
    pub async fn store(
        &self,
        original_filename: &str,
        data: impl Stream<Item = anyhow::Result<Bytes>> + Send + Unpin,
    ) -> BlobResult<StoredBlob> {
        let claim = self.unused_name(original_filename).await?;
        let name = claim.name.clone();
        let path = self.blob_path(&name);

        let upload = self.object_store.put_multipart(&path).await?;
        let mut writer = WriteMultipart::new(upload);
        let mut hasher = Sha256::new();
        match copy_chunks(&name, data, &mut writer, &mut hasher).await {
            Ok(size_bytes) => {
                writer.finish().await?;
                let stored = StoredBlob {
                    name,
                    size_bytes,
                    sha256_hash: format!("{:x}", hasher.finalize()),
                };
                info!(
                    blob = %stored.name,
                    size_bytes = stored.size_bytes,
                    bucket = %self.bucket,
                    "stored blob"
                );
                Ok(stored)
            }
            Err(err) => {
                if let Err(abort_err) = writer.abort().await {
                    warn!(blob = %name, "failed to abort multipart upload: {:?}", abort_err);
                }
                Err(err)
            }
        }
    }

    /// Opens a blob for streaming. A missing blob fails here, before any
    /// chunk is produced.
    pub async fn open_read(&self, name: &str) -> BlobResult<BlobReader> {
        name::validate_blob_name(name).map_err(|_| BlobError::NotFound {
            name: name.to_string(),
        })?;
        let get_result = self
            .object_store
            .get(&self.blob_path(name))
            .await
            .map_err(|e| match e {
                object_store::Error::NotFound { .. } => BlobError::NotFound {
                    name: name.to_string(),
                },
                other => other.into(),
            })?;
        let size_bytes = get_result.meta.size;
        let stream_name = name.to_string();
        let stream = get_result
            .into_stream()
            .map_err(move |source| BlobError::DownloadInterrupted {
                name: stream_name.clone(),
                source,
            })
            .boxed();
        Ok(BlobReader {
            name: name.to_string(),
            size_bytes,
            stream,
        })
    }

    pub async fn read_bytes(&self, name: &str) -> BlobResult<Bytes> {
        let mut reader = self.open_read(name).await?;
        let capacity = usize::try_from(reader.size_bytes).unwrap_or_default();
        let mut bytes = BytesMut::with_capacity(capacity);
        while let Some(chunk) = reader.stream.next().await {
            bytes.extend_from_slice(&chunk?);
        }
        Ok(bytes.into())
    }
}

async fn copy_chunks(
    name: &str,
    mut data: impl Stream<Item = anyhow::Result<Bytes>> + Send + Unpin,
    writer: &mut WriteMultipart,
    hasher: &mut Sha256,
) -> BlobResult<u64> {
    let mut size_bytes = 0;
    while let Some(chunk) = data.next().await {
        let chunk = chunk.map_err(|source| BlobError::UploadInterrupted {
            name: name.to_string(),
            source,
        })?;
        writer.wait_for_capacity(1).await?;
        hasher.update(&chunk);
        size_bytes += chunk.len() as u64;
        writer.write(&chunk);
    }
    Ok(size_bytes)
}
