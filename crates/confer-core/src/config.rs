use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ClientConfig {
    /// Upper bound on waiting for a service acknowledgement.
    #[serde(default = "default_ack_timeout_secs")]
    pub ack_timeout_secs: u64,
    /// Raises the subsession cap from 50 to 100.
    #[serde(default)]
    pub elevated_subsession_capacity: bool,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default)]
    pub log_filter: Option<String>,
}

fn default_ack_timeout_secs() -> u64 {
    10
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ack_timeout_secs: default_ack_timeout_secs(),
            elevated_subsession_capacity: false,
            log_filter: None,
        }
    }
}

impl ClientConfig {
    pub fn ack_timeout(&self) -> Duration {
        Duration::from_secs(self.ack_timeout_secs.max(1))
    }
}

/// `ClientConfig` persisted as `config.json` inside a data directory.
pub struct ConfigStore {
    config: Mutex<ClientConfig>,
    file_path: PathBuf,
}

impl ConfigStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        let file_path = data_dir.as_ref().join("config.json");
        let config = Self::load(&file_path);
        Self {
            config: Mutex::new(config),
            file_path,
        }
    }

    pub fn get(&self) -> ClientConfig {
        self.lock().clone()
    }

    pub fn set_ack_timeout_secs(&self, secs: u64) {
        self.lock().ack_timeout_secs = secs;
        self.save();
    }

    pub fn set_elevated_subsession_capacity(&self, elevated: bool) {
        self.lock().elevated_subsession_capacity = elevated;
        self.save();
    }

    pub fn set_log_filter(&self, filter: Option<String>) {
        self.lock().log_filter = filter;
        self.save();
    }

    fn lock(&self) -> MutexGuard<'_, ClientConfig> {
        self.config.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn save(&self) {
        let config = self.get();
        if let Some(parent) = self.file_path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!("cannot create config dir {}: {e}", parent.display());
                return;
            }
        }
        match serde_json::to_string_pretty(&config) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&self.file_path, json) {
                    tracing::warn!("cannot write {}: {e}", self.file_path.display());
                }
            }
            Err(e) => tracing::warn!("cannot serialise config: {e}"),
        }
    }

    fn load(path: &Path) -> ClientConfig {
        match std::fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("ignoring unreadable {}: {e}", path.display());
                ClientConfig::default()
            }),
            Err(_) => ClientConfig::default(),
        }
    }
}
