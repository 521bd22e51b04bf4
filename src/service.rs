use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use axum_server::Handle;
use blob_store::BlobStorage;
use state_store::MetadataStore;
use tokio::{self, signal};
use tracing::info;

use crate::{
    config::ServerConfig,
    routes::{create_routes, RouteState},
    survey_service::SurveyService,
};

#[derive(Clone)]
pub struct Service {
    pub config: ServerConfig,
    pub surveys: Arc<SurveyService>,
}

impl Service {
    pub async fn new(config: ServerConfig) -> Result<Self> {
        let blob_storage = Arc::new(
            BlobStorage::new(config.blob_storage.clone())
                .context("error initializing BlobStorage")?,
        );
        Self::with_blob_storage(config, blob_storage)
    }

    /// Builds the service around an already opened blob store.
    pub fn with_blob_storage(config: ServerConfig, blob_storage: Arc<BlobStorage>) -> Result<Self> {
        let metadata = MetadataStore::new(PathBuf::from(&config.state_store_path))
            .context("error initializing MetadataStore")?;
        let surveys = Arc::new(SurveyService::new(metadata, blob_storage));

        Ok(Self { config, surveys })
    }

    pub fn route_state(&self) -> RouteState {
        RouteState {
            surveys: self.surveys.clone(),
        }
    }

    pub async fn start(&self) -> Result<()> {
        let handle = Handle::new();
        let handle_sh = handle.clone();
        tokio::spawn(async move {
            shutdown_signal(handle_sh).await;
            info!("graceful shutdown signal received, shutting down server gracefully");
        });

        let addr: SocketAddr = self.config.listen_addr.parse()?;
        info!("server api listening on {}", self.config.listen_addr);
        let routes = create_routes(self.route_state(), self.config.max_upload_bytes);
        axum_server::bind(addr)
            .handle(handle)
            .serve(routes.into_make_service())
            .await?;

        Ok(())
    }
}

async fn shutdown_signal(handle: Handle) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                tracing::error!("failed to install signal handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
        },
        _ = terminate => {
        },
    }
    handle.graceful_shutdown(None);
    info!("signal received, shutting down server gracefully");
}
