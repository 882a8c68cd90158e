//! Offline stand-in for the platform layer.
//!
//! Answers probes from a fixed [`PlatformReport`], accepts every command and
//! keeps a log of what it was asked to do, which doubles as its recent logs.

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use vocalis_core::types::{CheckItem, CheckStatus, PermissionState};
use vocalis_core::user_config::{ConfigSection, ReplacementRule};
use vocalis_engine::{HostError, HostSelfCheck, PlatformHost, PlatformReport};

pub struct ReplayHost {
    platform: PlatformReport,
    log: Mutex<Vec<String>>,
}

impl ReplayHost {
    pub fn new(platform: PlatformReport) -> Self {
        Self {
            platform,
            log: Mutex::new(Vec::new()),
        }
    }

    fn record(&self, line: String) -> Result<(), HostError> {
        tracing::debug!(command = %line, "Replay host command");
        let mut log = self
            .log
            .lock()
            .map_err(|_| HostError::message("replay host log poisoned"))?;
        log.push(line);
        Ok(())
    }

    fn self_check(&self) -> HostSelfCheck {
        let probe = &self.platform.probe;
        let hotkey = match (probe.hotkey_press_available, probe.hotkey_release_available) {
            (true, true) => CheckItem::new(CheckStatus::Ok, "press and release detected"),
            (true, false) => CheckItem::new(CheckStatus::Warning, "press only, toggle mode"),
            _ => CheckItem::new(CheckStatus::Error, "global hotkey unavailable"),
        };
        let injection = if probe.keystroke_injection_available {
            CheckItem::new(CheckStatus::Ok, "keystroke injection available")
        } else if probe.clipboard_available {
            CheckItem::new(CheckStatus::Warning, "clipboard only")
        } else {
            CheckItem::new(CheckStatus::Error, "no injection path")
        };
        let microphone = match self.platform.microphone_permission {
            PermissionState::Granted | PermissionState::NotRequired => {
                CheckItem::new(CheckStatus::Ok, "microphone permitted")
            }
            PermissionState::Denied => CheckItem::new(CheckStatus::Error, "microphone denied"),
            PermissionState::Unknown => {
                CheckItem::new(CheckStatus::Warning, "microphone permission unknown")
            }
        };
        HostSelfCheck {
            hotkey,
            injection,
            microphone,
            sidecar: CheckItem::new(CheckStatus::Ok, "replay worker"),
            model: None,
        }
    }
}

#[async_trait]
impl PlatformHost for ReplayHost {
    async fn probe_platform(&self) -> Result<PlatformReport, HostError> {
        self.record("probe_platform".into())?;
        Ok(self.platform.clone())
    }

    async fn start_recording(&self) -> Result<(), HostError> {
        self.record("start_recording".into())
    }

    async fn stop_recording(&self) -> Result<(), HostError> {
        self.record("stop_recording".into())
    }

    async fn cancel_recording(&self) -> Result<(), HostError> {
        self.record("cancel_recording".into())
    }

    async fn set_audio_device(&self, device_uid: Option<&str>) -> Result<(), HostError> {
        self.record(format!("set_audio_device {}", device_uid.unwrap_or("default")))
    }

    async fn start_mic_test(&self, _device_uid: Option<&str>) -> Result<(), HostError> {
        self.record("start_mic_test".into())
    }

    async fn stop_mic_test(&self) -> Result<(), HostError> {
        self.record("stop_mic_test".into())
    }

    async fn update_config(
        &self,
        section: ConfigSection,
        partial: &Value,
    ) -> Result<(), HostError> {
        let keys = partial
            .as_object()
            .map(|map| map.keys().cloned().collect::<Vec<_>>().join(","))
            .unwrap_or_default();
        self.record(format!("update_config {} [{}]", section, keys))
    }

    async fn set_replacement_rules(&self, rules: &[ReplacementRule]) -> Result<(), HostError> {
        self.record(format!("set_replacement_rules count={}", rules.len()))
    }

    async fn download_model(&self, model_id: &str) -> Result<(), HostError> {
        self.record(format!("download_model {}", model_id))
    }

    async fn purge_model_cache(&self, model_id: &str) -> Result<(), HostError> {
        self.record(format!("purge_model_cache {}", model_id))
    }

    async fn restart_sidecar(&self) -> Result<(), HostError> {
        self.record("restart_sidecar".into())
    }

    async fn run_self_check(&self) -> Result<HostSelfCheck, HostError> {
        self.record("run_self_check".into())?;
        Ok(self.self_check())
    }

    async fn platform_diagnostics(&self) -> Result<String, HostError> {
        Ok(format!(
            "host: replay\nos: {}\narch: {}\ndisplay_server: {}",
            std::env::consts::OS,
            std::env::consts::ARCH,
            self.platform.display_server
        ))
    }

    async fn get_recent_logs(&self, count: usize) -> Result<Vec<String>, HostError> {
        let log = self
            .log
            .lock()
            .map_err(|_| HostError::message("replay host log poisoned"))?;
        let skip = log.len().saturating_sub(count);
        Ok(log[skip..].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vocalis_core::types::{DisplayServer, PlatformProbe};

    #[tokio::test]
    async fn test_recent_logs_keep_tail() {
        let host = ReplayHost::new(PlatformReport::default());
        host.start_recording().await.unwrap();
        host.stop_recording().await.unwrap();
        host.download_model("base").await.unwrap();
        let logs = host.get_recent_logs(2).await.unwrap();
        assert_eq!(logs, vec!["stop_recording", "download_model base"]);
    }

    #[tokio::test]
    async fn test_self_check_reflects_probe() {
        let host = ReplayHost::new(PlatformReport {
            display_server: DisplayServer::Wayland { compositor: None },
            probe: PlatformProbe {
                hotkey_press_available: true,
                clipboard_available: true,
                ..PlatformProbe::default()
            },
            microphone_permission: PermissionState::Granted,
            ..PlatformReport::default()
        });
        let check = host.run_self_check().await.unwrap();
        assert_eq!(check.hotkey.status, CheckStatus::Warning);
        assert_eq!(check.injection.status, CheckStatus::Warning);
        assert_eq!(check.microphone.status, CheckStatus::Ok);
        assert!(check.model.is_none());
    }
}
