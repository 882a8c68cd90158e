use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, VocalisError};

/// Top-level configuration for the Vocalis engine.
///
/// Loaded from `~/.vocalis/engine.toml` by default. This is the engine's own
/// tuning; the user's dictation preferences live in [`crate::user_config::UserConfig`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VocalisConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub model: ModelConfig,
}

impl VocalisConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: VocalisConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| VocalisError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Transcript history bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Bound applied when the user configuration does not set one.
    pub fallback_max_entries: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            fallback_max_entries: 100,
        }
    }
}

/// Diagnostics report settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Maximum report length in characters before truncation.
    pub max_chars: usize,
    /// Number of recent log lines requested from the host.
    pub recent_log_lines: usize,
    /// Replacement for home-directory prefixes.
    pub home_placeholder: String,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            max_chars: 200_000,
            recent_log_lines: 200,
            home_placeholder: "<HOME>".to_string(),
        }
    }
}

/// Event bus settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Capacity of the append-only transcript channel.
    pub channel_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 64,
        }
    }
}

/// Recognition model defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Model used when the user configuration names none.
    pub default_model_id: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            default_model_id: "nvidia/parakeet-tdt-0.6b-v2".to_string(),
        }
    }
}
