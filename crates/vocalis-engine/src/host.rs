//! The platform-integration collaborator.
//!
//! Everything OS-specific (hotkeys, keystroke injection, audio devices, worker
//! supervision, config persistence) sits behind [`PlatformHost`]. The engine
//! only ever calls these methods from command paths.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use vocalis_core::types::{CheckItem, ErrorCode};
use vocalis_core::user_config::{ConfigSection, ReplacementRule};

use crate::capability::PlatformReport;

/// A failed collaborator call.
///
/// The payload keeps whatever shape the platform layer produced so that the
/// error normalizer can read it.
#[derive(Debug, Clone, Error)]
#[error("{payload}")]
pub struct HostError {
    pub payload: Value,
}

impl HostError {
    pub fn new(payload: Value) -> Self {
        Self { payload }
    }

    /// Plain message with no code.
    pub fn message(message: impl Into<String>) -> Self {
        Self::new(Value::String(message.into()))
    }

    /// Structured error in the current wire shape.
    pub fn coded(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(json!({
            "error": {
                "code": code.as_wire(),
                "message": message.into(),
                "recoverable": code.default_recoverable(),
            }
        }))
    }
}

/// Self-check as reported by the platform layer.
///
/// The model item is optional; when absent it is derived from tracked status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSelfCheck {
    pub hotkey: CheckItem,
    pub injection: CheckItem,
    pub microphone: CheckItem,
    pub sidecar: CheckItem,
    #[serde(default)]
    pub model: Option<CheckItem>,
}

#[async_trait]
pub trait PlatformHost: Send + Sync {
    /// Report display server, probe booleans and permission states.
    async fn probe_platform(&self) -> Result<PlatformReport, HostError>;

    async fn start_recording(&self) -> Result<(), HostError>;

    async fn stop_recording(&self) -> Result<(), HostError>;

    async fn cancel_recording(&self) -> Result<(), HostError>;

    /// Select an input device. `None` selects the system default.
    async fn set_audio_device(&self, device_uid: Option<&str>) -> Result<(), HostError>;

    async fn start_mic_test(&self, device_uid: Option<&str>) -> Result<(), HostError>;

    async fn stop_mic_test(&self) -> Result<(), HostError>;

    /// Persist a partial update of one configuration section.
    async fn update_config(&self, section: ConfigSection, partial: &Value)
        -> Result<(), HostError>;

    async fn set_replacement_rules(&self, rules: &[ReplacementRule]) -> Result<(), HostError>;

    async fn download_model(&self, model_id: &str) -> Result<(), HostError>;

    async fn purge_model_cache(&self, model_id: &str) -> Result<(), HostError>;

    async fn restart_sidecar(&self) -> Result<(), HostError>;

    async fn run_self_check(&self) -> Result<HostSelfCheck, HostError>;

    /// Free-form platform diagnostics text.
    async fn platform_diagnostics(&self) -> Result<String, HostError>;

    async fn get_recent_logs(&self, count: usize) -> Result<Vec<String>, HostError>;
}
