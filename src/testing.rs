use std::sync::Arc;

use anyhow::Result;
use axum::{
    body::{Body, Bytes},
    http::{header, Method, Request, StatusCode},
    Router,
};
use blob_store::{test_objects::tests::FailingReadStore, BlobStorage, BlobStorageConfig};
use futures::StreamExt;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;
use tracing::subscriber;
use tracing_subscriber::{layer::SubscriberExt, Layer};

use crate::{
    config::{ServerConfig, DEFAULT_MAX_UPLOAD_BYTES},
    routes::create_routes,
    service::Service,
};

pub struct TestService {
    pub service: Service,
    pub temp_dir: TempDir,
}

impl TestService {
    /// A service backed by an in-memory blob store.
    pub async fn new() -> Result<Self> {
        Self::build(|_| BlobStorageConfig::in_memory(), DEFAULT_MAX_UPLOAD_BYTES, None).await
    }

    /// A service storing blobs under the test's temp dir.
    pub async fn with_local_blobs() -> Result<Self> {
        Self::with_upload_limit(DEFAULT_MAX_UPLOAD_BYTES).await
    }

    /// Local blobs, with request bodies capped at `max_upload_bytes`.
    pub async fn with_upload_limit(max_upload_bytes: usize) -> Result<Self> {
        Self::build(
            |dir| BlobStorageConfig::new(&dir.join("blob_store").display().to_string(), "images"),
            max_upload_bytes,
            None,
        )
        .await
    }

    /// A service whose image reads fail partway through the transfer.
    pub async fn with_failing_reads() -> Result<Self> {
        let blob_storage = BlobStorage::with_object_store(
            Arc::new(FailingReadStore::default()),
            Default::default(),
            "images",
        )?;
        Self::build(
            |_| BlobStorageConfig::in_memory(),
            DEFAULT_MAX_UPLOAD_BYTES,
            Some(Arc::new(blob_storage)),
        )
        .await
    }

    async fn build(
        blob_storage_config: impl FnOnce(&std::path::Path) -> BlobStorageConfig,
        max_upload_bytes: usize,
        blob_storage: Option<Arc<BlobStorage>>,
    ) -> Result<Self> {
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug"));
        let _ = subscriber::set_global_default(
            tracing_subscriber::registry()
                .with(tracing_subscriber::fmt::layer().with_filter(env_filter)),
        );

        let temp_dir = tempfile::tempdir()?;
        let cfg = ServerConfig {
            state_store_path: temp_dir
                .path()
                .join("state_store")
                .display()
                .to_string(),
            blob_storage: blob_storage_config(temp_dir.path()),
            max_upload_bytes,
            ..Default::default()
        };
        cfg.validate()?;
        let service = match blob_storage {
            Some(blob_storage) => Service::with_blob_storage(cfg, blob_storage)?,
            None => Service::new(cfg).await?,
        };

        Ok(Self { service, temp_dir })
    }

    pub fn router(&self) -> Router {
        create_routes(
            self.service.route_state(),
            self.service.config.max_upload_bytes,
        )
    }

    /// Sends one request through the full router stack.
    pub async fn send(&self, request: Request<Body>) -> Result<TestResponse> {
        let response = self.router().oneshot(request).await?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.into_body().collect().await?.to_bytes();
        Ok(TestResponse {
            status,
            content_type,
            body,
        })
    }

    pub async fn get(&self, uri: &str) -> Result<TestResponse> {
        self.send(Request::get(uri).body(Body::empty())?).await
    }

    /// Files written under the local blob directory, if any.
    pub fn stored_blob_count(&self) -> usize {
        count_files(&self.temp_dir.path().join("blob_store"))
    }
}

fn count_files(dir: &std::path::Path) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .filter_map(|entry| entry.ok())
        .map(|entry| {
            let path = entry.path();
            if path.is_dir() {
                count_files(&path)
            } else {
                1
            }
        })
        .sum()
}

pub struct TestResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

const BOUNDARY: &str = "survey-test-boundary";

/// Builds `multipart/form-data` request bodies.
#[derive(Default)]
pub struct MultipartForm {
    body: Vec<u8>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, filename: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn into_request(self, method: Method, uri: &str) -> Result<Request<Body>> {
        let body = Body::from(self.finish());
        Self::request(method, uri, body)
    }

    /// Like `into_request`, but the body arrives in frames of at most
    /// `frame_size` bytes, the way a slow client would send it. Each frame
    /// is only ready after the reader has been parked once.
    pub fn into_framed_request(
        self,
        method: Method,
        uri: &str,
        frame_size: usize,
    ) -> Result<Request<Body>> {
        let frames: Vec<Result<Bytes, std::io::Error>> = self
            .finish()
            .chunks(frame_size)
            .map(|frame| Ok(Bytes::copy_from_slice(frame)))
            .collect();
        let frames = futures::stream::iter(frames).then(|frame| async move {
            tokio::task::yield_now().await;
            frame
        });
        Self::request(method, uri, Body::from_stream(frames))
    }

    fn finish(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.body
    }

    fn request(method: Method, uri: &str, body: Body) -> Result<Request<Body>> {
        Ok(Request::builder()
            .method(method)
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(body)?)
    }
}
