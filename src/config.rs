use std::{
    env,
    net::SocketAddr,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Result};
use blob_store::{BlobStorage, BlobStorageConfig};
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Environment variables with this prefix override file settings.
/// Nested keys are separated by `__`, e.g. `SURVEY_BLOB_STORAGE__BUCKET`.
pub const ENV_PREFIX: &str = "SURVEY_";

/// 25 MiB
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub state_store_path: String,
    pub listen_addr: String,
    pub blob_storage: BlobStorageConfig,
    /// Upper bound on a request body, images included.
    pub max_upload_bytes: usize,
    #[serde(default)]
    pub structured_logging: bool,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Export spans over OTLP.
    pub enable_tracing: bool,
    /// OTLP collector endpoint. The exporter default is used when unset.
    pub endpoint: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let state_store_path = env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join("survey_storage/state");
        ServerConfig {
            state_store_path: state_store_path.display().to_string(),
            listen_addr: "0.0.0.0:8900".to_string(),
            blob_storage: Default::default(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            structured_logging: false,
            telemetry: Default::default(),
        }
    }
}

impl ServerConfig {
    /// Defaults, then the optional YAML file, then `SURVEY_*` variables.
    pub fn load(path: Option<&Path>) -> Result<ServerConfig> {
        let mut figment = Figment::from(Serialized::defaults(ServerConfig::default()));
        if let Some(path) = path {
            let config_str = std::fs::read_to_string(path)
                .map_err(|e| anyhow!("unable to read config file {}: {}", path.display(), e))?;
            figment = figment.merge(Yaml::string(&config_str));
        }
        let config: ServerConfig = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.listen_addr.parse::<SocketAddr>().is_err() {
            return Err(anyhow!("invalid listen address: {}", self.listen_addr));
        }
        if self.blob_storage.bucket.trim().is_empty() {
            return Err(anyhow!("blob storage bucket must not be empty"));
        }
        BlobStorage::build_object_store(&self.blob_storage.path)?;
        if self.max_upload_bytes == 0 {
            return Err(anyhow!("max_upload_bytes must be greater than zero"));
        }
        Ok(())
    }
}
