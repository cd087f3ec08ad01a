//! Server configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where records and users are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Process memory; everything is lost on restart.
    Memory,
    /// SQLite database file at `storage_path`. Reads open their own
    /// connections, so in-memory and temporary databases are not supported;
    /// use `Memory` for a throwaway server.
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub backend: Backend,
    pub storage_path: PathBuf,
    /// HMAC key for bearer tokens. Must be set, usually via the environment.
    pub token_secret: String,
    pub max_payload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8743".to_string(),
            backend: Backend::Sqlite,
            storage_path: PathBuf::from("passkeep.db"),
            token_secret: String::new(),
            max_payload_size: 8 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.token_secret.is_empty() {
            anyhow::bail!("token secret is not set (use --token-secret or PASSKEEP_TOKEN_SECRET)");
        }
        if self.max_payload_size == 0 {
            anyhow::bail!("max_payload_size must be positive");
        }
        if self.backend == Backend::Sqlite {
            let path = self.storage_path.to_string_lossy();
            if path.is_empty() || path == ":memory:" || path.starts_with("file::memory:") {
                anyhow::bail!(
                    "storage_path {:?} is not a database file, use the memory backend instead",
                    path
                );
            }
        }
        Ok(())
    }
}
