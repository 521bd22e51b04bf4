//! Bridges between HTTP bodies and the blob store.

mod download;
mod upload;

pub use download::{DownloadPipeline, ImageDownload};
pub use upload::{UploadPipeline, IMAGE_FIELD};
