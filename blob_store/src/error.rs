pub type BlobResult<T> = Result<T, BlobError>;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum BlobError {
    #[error("blob not found: {name}")]
    NotFound { name: String },

    #[error("invalid blob name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    #[error("invalid blob storage url {url}: {reason}")]
    InvalidConfig { url: String, reason: String },

    #[error("no free blob name for {filename} after {attempts} attempts")]
    NameExhausted { filename: String, attempts: usize },

    #[error("upload of blob {name} was interrupted. error: {source}")]
    UploadInterrupted {
        name: String,
        source: anyhow::Error,
    },

    #[error("download of blob {name} was interrupted. error: {source}")]
    DownloadInterrupted {
        name: String,
        source: object_store::Error,
    },

    #[error(transparent)]
    ObjectStore {
        #[from]
        source: object_store::Error,
    },
}

impl BlobError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Errors caused by the caller's input rather than the storage backend.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidName { .. })
    }
}
