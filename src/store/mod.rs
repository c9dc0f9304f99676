pub mod config;
pub mod history;

use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::instrument;

pub use config::{Config, ConfigError, WebhookEntry};
pub use history::SentHistory;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to (de)serialize document: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = core::result::Result<T, StoreError>;

/// File-backed storage for the configuration and sent-code history documents.
///
/// Both documents are pretty-printed JSON. Loading never fails: a missing document is created
/// from defaults and an unreadable one is replaced by defaults in memory.
#[derive(Debug, Clone)]
pub struct JsonStore {
    config_path: PathBuf,
    codes_path: PathBuf,
}

impl JsonStore {
    pub fn new(config_path: impl Into<PathBuf>, codes_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            codes_path: codes_path.into(),
        }
    }

    #[instrument(skip(self), fields(path = %self.config_path.display()))]
    pub async fn load_config(&self) -> Config {
        let loaded = match read_document(&self.config_path).await {
            Ok(Some(doc)) => Config::from_document(doc)
                .map(Some)
                .map_err(StoreError::from),
            Ok(None) => Ok(None),
            Err(e) => Err(e),
        };

        let (config, write_back) = match loaded {
            Ok(Some((config, migrated))) => {
                if migrated {
                    tracing::info!(
                        webhooks = config.webhooks.len(),
                        "migrated legacy single-webhook config"
                    );
                }
                (config, migrated)
            }
            Ok(None) => {
                tracing::info!("no config found, creating defaults");
                (Config::default(), true)
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to load config, using defaults");
                (Config::default(), false)
            }
        };

        if write_back && let Err(e) = self.save_config(&config).await {
            tracing::error!(error = %e, "failed to write config");
        }

        config
    }

    pub async fn save_config(&self, config: &Config) -> StoreResult<()> {
        write_document(&self.config_path, config).await
    }

    #[instrument(skip(self), fields(path = %self.codes_path.display()))]
    pub async fn load_history(&self) -> SentHistory {
        let loaded = match read_document(&self.codes_path).await {
            Ok(Some(doc)) => SentHistory::from_document(doc)
                .map(Some)
                .map_err(StoreError::from),
            Ok(None) => Ok(None),
            Err(e) => Err(e),
        };

        match loaded {
            Ok(Some(history)) => history,
            Ok(None) => {
                let history = SentHistory::default();
                if let Err(e) = self.save_history(&history).await {
                    tracing::error!(error = %e, "failed to write sent codes");
                }
                history
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to load sent codes, starting empty");
                SentHistory::default()
            }
        }
    }

    pub async fn save_history(&self, history: &SentHistory) -> StoreResult<()> {
        write_document(&self.codes_path, history).await
    }
}

async fn read_document(path: &Path) -> StoreResult<Option<Value>> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StoreError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Writes to a sibling temp file and renames it over `path` so readers never see a torn document
async fn write_document<T: Serialize>(path: &Path, document: &T) -> StoreResult<()> {
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(dir).await.map_err(io_err)?;
    }

    let data = serde_json::to_string_pretty(document)?;
    let tmp = path.with_extension("json.tmp");

    tokio::fs::write(&tmp, data).await.map_err(io_err)?;
    tokio::fs::rename(&tmp, path).await.map_err(io_err)?;

    Ok(())
}
