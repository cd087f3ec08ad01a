//! Platform-specific paths for the client's config and local state.

use std::path::PathBuf;

/// Get the platform-specific data directory for storing application data
///
/// Returns:
/// - Windows: %LOCALAPPDATA%\PassKeep
/// - macOS: ~/Library/Application Support/PassKeep
/// - Linux/Other: ~/.local/share/PassKeep
pub fn get_data_dir() -> PathBuf {
    let base = dirs::data_local_dir()
        .or_else(dirs::data_dir)
        .or_else(|| dirs::home_dir().map(|h| h.join(".data")))
        .unwrap_or_else(|| PathBuf::from("."));

    base.join("PassKeep")
}

/// Get the platform-specific config directory
///
/// Returns:
/// - Windows: %APPDATA%\PassKeep
/// - macOS: ~/Library/Application Support/PassKeep
/// - Linux/Other: ~/.config/PassKeep
pub fn get_config_dir() -> PathBuf {
    let base = dirs::config_dir()
        .or_else(dirs::data_dir)
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .unwrap_or_else(|| PathBuf::from("."));

    base.join("PassKeep")
}

/// Get the default local state snapshot path
pub fn get_default_state_path() -> PathBuf {
    get_data_dir().join("state.bin")
}

/// Get the default client config path
pub fn get_default_config_path() -> PathBuf {
    get_config_dir().join("client.toml")
}
