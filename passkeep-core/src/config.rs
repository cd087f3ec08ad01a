//! Client configuration.

use crate::platform::get_default_state_path;
use crate::{PassKeepError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the passkeep server.
    pub server_url: String,
    /// Timeout for sign up / sign in calls.
    pub auth_timeout_secs: u64,
    /// Timeout for each push or pull call.
    pub sync_timeout_secs: u64,
    /// Local snapshot location; the platform data dir when unset.
    pub state_path: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8743".to_string(),
            auth_timeout_secs: 5,
            sync_timeout_secs: 10,
            state_path: None,
        }
    }
}

impl ClientConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| PassKeepError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Load `path` if it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "no client config, using defaults");
            Ok(Self::default())
        }
    }

    pub fn state_path(&self) -> PathBuf {
        self.state_path
            .clone()
            .unwrap_or_else(get_default_state_path)
    }
}
