//! Configuration loader for Skillgate.
//!
//! Reads `config.toml` from the data directory (`~/.skillgate/` in
//! production) and deserializes it into [`OrchestratorConfig`]. Falls back
//! to defaults when the file is missing or malformed.

use std::path::{Path, PathBuf};

use skillgate_types::config::OrchestratorConfig;

/// Resolve the data directory: `SKILLGATE_DATA_DIR` if set, else
/// `~/.skillgate`.
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("SKILLGATE_DATA_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".skillgate")
}

/// Load orchestrator configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`OrchestratorConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
/// - If the file exists and parses successfully, returns the parsed config.
pub async fn load_config(data_dir: &Path) -> OrchestratorConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return OrchestratorConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return OrchestratorConfig::default();
        }
    };

    match toml::from_str::<OrchestratorConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            OrchestratorConfig::default()
        }
    }
}
