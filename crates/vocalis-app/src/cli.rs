//! CLI argument definitions for the Vocalis replay binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

/// Vocalis - replays dictation events through the state engine and prints the result.
#[derive(Parser, Debug)]
#[command(name = "vocalis", version, about)]
pub struct CliArgs {
    /// Path to the engine configuration file (TOML).
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Newline-delimited JSON event log: one `{"topic": .., "payload": ..}` per line.
    #[arg(short = 'e', long = "events")]
    pub events: Option<PathBuf>,

    /// User configuration document (JSON) to mirror.
    #[arg(short = 'u', long = "user-config")]
    pub user_config: Option<PathBuf>,

    /// Platform report (JSON) the replay host answers probes with.
    #[arg(short = 'p', long = "platform")]
    pub platform: Option<PathBuf>,

    /// Print a diagnostics report after the snapshot.
    #[arg(long = "diagnostics")]
    pub diagnostics: bool,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > VOCALIS_CONFIG env var > platform default (~/.vocalis/engine.toml).
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("VOCALIS_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the log level.
    ///
    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".vocalis").join("engine.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".vocalis").join("engine.toml");
    }
    PathBuf::from("engine.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_flag_wins() {
        let args = CliArgs::parse_from(["vocalis", "--config", "/tmp/custom.toml"]);
        assert_eq!(args.resolve_config_path(), PathBuf::from("/tmp/custom.toml"));
    }

    #[test]
    fn test_log_level_falls_back_to_config() {
        let args = CliArgs::parse_from(["vocalis"]);
        assert_eq!(args.resolve_log_level("warn"), "warn");
        let args = CliArgs::parse_from(["vocalis", "-l", "debug"]);
        assert_eq!(args.resolve_log_level("warn"), "debug");
    }

    #[test]
    fn test_replay_flags() {
        let args = CliArgs::parse_from(["vocalis", "-e", "events.ndjson", "--diagnostics"]);
        assert_eq!(args.events, Some(PathBuf::from("events.ndjson")));
        assert!(args.diagnostics);
        assert!(args.platform.is_none());
    }
}
