//! Key-value persistence port for session and result snapshots, with a
//! file-backed implementation. A corrupt stored value is logged and
//! treated as absent, never propagated.

use std::fs;
use std::path::PathBuf;

use serde_json::Value;
use tracing::warn;

/// Well-known storage keys.
pub mod keys {
    pub const USER: &str = "usuario";
    pub const CURRENT_ASSESSMENT: &str = "id_autoevaluacion";
    pub const LOCAL_HISTORY: &str = "historial_local";
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to persist key '{key}': {source}")]
    Write {
        key: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize value for key '{key}': {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Persistence port injected into the flow controller so it can be
/// exercised without a real store.
pub trait ResultStore: Send + Sync {
    /// Load a value; missing keys and unparseable values both read as None.
    fn load(&self, key: &str) -> Option<Value>;
    fn save(&self, key: &str, value: &Value) -> Result<(), StorageError>;
    fn remove(&self, key: &str);
}

/// One JSON file per key under a base directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    base_dir: PathBuf,
}

impl FileStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.base_dir.join(format!("{key}.json"))
    }
}

impl ResultStore for FileStore {
    fn load(&self, key: &str) -> Option<Value> {
        let path = self.path_for(key);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                warn!(key, %err, "failed to read stored value");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key, %err, "stored value is not valid JSON, treating as absent");
                None
            }
        }
    }

    fn save(&self, key: &str, value: &Value) -> Result<(), StorageError> {
        fs::create_dir_all(&self.base_dir).map_err(|source| StorageError::Write {
            key: key.to_string(),
            source,
        })?;

        let raw = serde_json::to_string(value).map_err(|source| StorageError::Serialize {
            key: key.to_string(),
            source,
        })?;

        fs::write(self.path_for(key), raw).map_err(|source| StorageError::Write {
            key: key.to_string(),
            source,
        })
    }

    fn remove(&self, key: &str) {
        if let Err(err) = fs::remove_file(self.path_for(key)) {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!(key, %err, "failed to remove stored value");
            }
        }
    }
}
