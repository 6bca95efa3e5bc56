//! Server configuration, loaded from a TOML file.

use std::path::{Path, PathBuf};

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub storage: StorageConfig,
    pub jwt: JwtConfig,
    pub payload: PayloadConfig,
    pub artifacts: ArtifactsConfig,
    #[serde(default)]
    pub workers: WorkersConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Base directory for the embedded stores.
    pub data_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    /// HMAC secret used to validate bearer tokens.
    pub secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PayloadConfig {
    /// Origin embedded in scannable payloads (`scheme://host`, no path).
    pub origin: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactsConfig {
    /// Public base URL under which the blob directory is served.
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkersConfig {
    pub count: usize,
    pub poll_interval: u64,
    pub stuck_check_interval: u64,
    pub stuck_threshold: i64,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        let d = issuance::WorkerConfig::default();
        Self {
            count: d.workers,
            poll_interval: d.poll_interval,
            stuck_check_interval: d.stuck_check_interval,
            stuck_threshold: d.stuck_threshold,
        }
    }
}

impl ServerConfig {
    /// Resolve a context name or path to a config file path.
    /// A bare name resolves to `/etc/qrseal/<name>.toml`.
    pub fn resolve_path(name_or_path: &str) -> PathBuf {
        if name_or_path.contains('/') || name_or_path.contains('.') {
            PathBuf::from(name_or_path)
        } else {
            PathBuf::from(format!("/etc/qrseal/{}.toml", name_or_path))
        }
    }

    /// Load and parse the config file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("cannot read {}: {}", path.display(), e))?;
        let config: ServerConfig = toml::from_str(&text)
            .map_err(|e| anyhow::anyhow!("cannot parse {}: {}", path.display(), e))?;
        Ok(config)
    }

    pub fn worker_config(&self) -> issuance::WorkerConfig {
        issuance::WorkerConfig {
            workers: self.workers.count,
            poll_interval: self.workers.poll_interval,
            stuck_check_interval: self.workers.stuck_check_interval,
            stuck_threshold: self.workers.stuck_threshold,
        }
    }
}
