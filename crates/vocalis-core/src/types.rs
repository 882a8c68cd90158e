use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Application lifecycle
// =============================================================================

/// The single top-level lifecycle value of the application.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppState {
    /// Ready to record.
    #[default]
    Idle,
    /// The recognition model is being loaded by the worker.
    LoadingModel,
    /// Microphone capture in progress.
    Recording,
    /// Captured audio is being transcribed.
    Transcribing,
    /// Something failed; the current error detail explains what.
    Error,
}

impl AppState {
    /// Map a recording-phase string onto an application state.
    ///
    /// Returns `None` for phases this build does not know about so that callers
    /// can leave the current state untouched.
    pub fn from_phase(phase: &str) -> Option<Self> {
        match phase.trim().to_ascii_lowercase().as_str() {
            "idle" => Some(AppState::Idle),
            "loading_model" | "loading-model" => Some(AppState::LoadingModel),
            "recording" => Some(AppState::Recording),
            "transcribing" => Some(AppState::Transcribing),
            "error" => Some(AppState::Error),
            _ => None,
        }
    }

    /// Whether a dictation session is in flight.
    pub fn is_busy(&self) -> bool {
        matches!(self, AppState::Recording | AppState::Transcribing)
    }
}

impl fmt::Display for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AppState::Idle => "idle",
            AppState::LoadingModel => "loading_model",
            AppState::Recording => "recording",
            AppState::Transcribing => "transcribing",
            AppState::Error => "error",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Platform capabilities
// =============================================================================

/// Windowing system the application runs under.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DisplayServer {
    Windows,
    Macos,
    X11,
    Wayland {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        compositor: Option<String>,
    },
    #[default]
    Unknown,
}

impl fmt::Display for DisplayServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayServer::Windows => f.write_str("Windows"),
            DisplayServer::Macos => f.write_str("macOS"),
            DisplayServer::X11 => f.write_str("X11"),
            DisplayServer::Wayland {
                compositor: Some(name),
            } => write!(f, "Wayland ({})", name),
            DisplayServer::Wayland { compositor: None } => f.write_str("Wayland"),
            DisplayServer::Unknown => f.write_str("an unknown display server"),
        }
    }
}

/// OS permission state for a protected resource.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionState {
    Granted,
    Denied,
    #[default]
    Unknown,
    NotRequired,
}

/// How the dictation hotkey activates recording.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationMode {
    /// Record while the key is held, stop on release.
    #[default]
    Hold,
    /// First press starts, second press stops.
    Toggle,
}

impl fmt::Display for ActivationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivationMode::Hold => f.write_str("hold"),
            ActivationMode::Toggle => f.write_str("toggle"),
        }
    }
}

/// How transcribed text reaches the focused window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjectionMethod {
    /// Synthesized keystrokes.
    #[default]
    Direct,
    /// Text is placed on the clipboard; the user pastes.
    Clipboard,
    /// Text is placed on the clipboard and a paste shortcut is synthesized.
    ClipboardAutopaste,
}

impl fmt::Display for InjectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InjectionMethod::Direct => f.write_str("direct"),
            InjectionMethod::Clipboard => f.write_str("clipboard"),
            InjectionMethod::ClipboardAutopaste => f.write_str("clipboard_autopaste"),
        }
    }
}

/// A user-configured value next to the value actually in force.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EffectiveMode<T> {
    pub configured: T,
    pub effective: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl<T: PartialEq + Copy> EffectiveMode<T> {
    /// A mode where the platform honours the configuration as-is.
    pub fn honoured(value: T) -> Self {
        Self {
            configured: value,
            effective: value,
            reason: None,
        }
    }

    /// Whether the platform overrode the configured value.
    pub fn is_overridden(&self) -> bool {
        self.configured != self.effective
    }
}

/// Raw booleans reported by the platform-integration layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformProbe {
    pub hotkey_press_available: bool,
    pub hotkey_release_available: bool,
    pub keystroke_injection_available: bool,
    pub clipboard_available: bool,
    /// Whether a paste shortcut can be synthesized after a clipboard write.
    pub paste_synthesis_available: bool,
}

/// Everything the application knows about what the platform can do.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Capabilities {
    pub display_server: DisplayServer,
    pub probe: PlatformProbe,
    pub microphone_permission: PermissionState,
    pub accessibility_permission: PermissionState,
    pub hotkey_mode: EffectiveMode<ActivationMode>,
    pub injection_method: EffectiveMode<InjectionMethod>,
}

// =============================================================================
// Model lifecycle
// =============================================================================

/// Lifecycle of the recognition model as reported by the worker.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelLifecycle {
    Missing,
    Loading,
    Downloading,
    Verifying,
    Ready,
    Error,
    #[default]
    Unknown,
}

impl ModelLifecycle {
    /// Fold a wire status string into the lifecycle, accepting historical spellings.
    pub fn from_wire(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "missing" | "available" | "not_downloaded" | "absent" => ModelLifecycle::Missing,
            "loading" | "installing" | "initializing" => ModelLifecycle::Loading,
            "downloading" => ModelLifecycle::Downloading,
            "verifying" | "checking" => ModelLifecycle::Verifying,
            "ready" | "loaded" => ModelLifecycle::Ready,
            "error" | "failed" => ModelLifecycle::Error,
            _ => ModelLifecycle::Unknown,
        }
    }

    /// Whether bytes are still moving for this model.
    pub fn is_transferring(&self) -> bool {
        matches!(self, ModelLifecycle::Downloading | ModelLifecycle::Verifying)
    }
}

impl fmt::Display for ModelLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModelLifecycle::Missing => "missing",
            ModelLifecycle::Loading => "loading",
            ModelLifecycle::Downloading => "downloading",
            ModelLifecycle::Verifying => "verifying",
            ModelLifecycle::Ready => "ready",
            ModelLifecycle::Error => "error",
            ModelLifecycle::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Transfer or processing progress for a model operation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelProgress {
    pub current: u64,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default = "default_progress_unit")]
    pub unit: String,
}

fn default_progress_unit() -> String {
    "processing".to_string()
}

/// Merged status of one recognition model.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelStatus {
    pub model_id: String,
    pub status: ModelLifecycle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<ModelProgress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// =============================================================================
// Worker process health
// =============================================================================

/// Health of the recognition worker process.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SidecarState {
    #[default]
    Ready,
    Restarting,
    Failed,
}

impl SidecarState {
    /// Parse a wire state, accepting older spellings. Unknown values yield `None`.
    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "ready" | "running" | "healthy" => Some(SidecarState::Ready),
            "restarting" | "starting" | "crashed" => Some(SidecarState::Restarting),
            "failed" | "circuit_open" | "stopped" => Some(SidecarState::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for SidecarState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SidecarState::Ready => f.write_str("ready"),
            SidecarState::Restarting => f.write_str("restarting"),
            SidecarState::Failed => f.write_str("failed"),
        }
    }
}

/// Last reported worker health.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SidecarStatus {
    pub state: SidecarState,
    pub restart_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SidecarStatus {
    /// Whether the UI should offer one-click recovery.
    pub fn recovery_needed(&self) -> bool {
        matches!(self.state, SidecarState::Restarting | SidecarState::Failed)
    }
}

// =============================================================================
// Transcripts
// =============================================================================

/// Outcome of delivering a transcript to the focused window.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InjectionResult {
    Injected,
    ClipboardOnly { reason: String },
    Error { message: String },
}

/// One completed dictation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub id: Uuid,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_text: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub audio_duration_ms: u64,
    #[serde(default)]
    pub transcription_duration_ms: u64,
    pub injection_result: InjectionResult,
}

// =============================================================================
// Errors
// =============================================================================

/// Closed error taxonomy shared with the worker and platform layers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum ErrorCode {
    SidecarSpawn,
    SidecarIpc,
    SidecarCrash,
    SidecarCircuitBreaker,
    MicPermissionDenied,
    DeviceRemoved,
    NoAudioDevice,
    RecordingFailed,
    TranscriptionFailed,
    TranscriptionTimeout,
    ModelNotReady,
    ModelDownloadFailed,
    DiskFull,
    CacheCorrupt,
    Network,
    InjectionFailed,
    OverlayFailed,
    UnsupportedLanguage,
    Internal,
}

impl ErrorCode {
    /// Every code, in taxonomy order.
    pub const ALL: [ErrorCode; 19] = [
        ErrorCode::SidecarSpawn,
        ErrorCode::SidecarIpc,
        ErrorCode::SidecarCrash,
        ErrorCode::SidecarCircuitBreaker,
        ErrorCode::MicPermissionDenied,
        ErrorCode::DeviceRemoved,
        ErrorCode::NoAudioDevice,
        ErrorCode::RecordingFailed,
        ErrorCode::TranscriptionFailed,
        ErrorCode::TranscriptionTimeout,
        ErrorCode::ModelNotReady,
        ErrorCode::ModelDownloadFailed,
        ErrorCode::DiskFull,
        ErrorCode::CacheCorrupt,
        ErrorCode::Network,
        ErrorCode::InjectionFailed,
        ErrorCode::OverlayFailed,
        ErrorCode::UnsupportedLanguage,
        ErrorCode::Internal,
    ];

    /// Wire representation, e.g. `E_NETWORK`.
    pub fn as_wire(&self) -> &'static str {
        match self {
            ErrorCode::SidecarSpawn => "E_SIDECAR_SPAWN",
            ErrorCode::SidecarIpc => "E_SIDECAR_IPC",
            ErrorCode::SidecarCrash => "E_SIDECAR_CRASH",
            ErrorCode::SidecarCircuitBreaker => "E_SIDECAR_CIRCUIT_BREAKER",
            ErrorCode::MicPermissionDenied => "E_MIC_PERMISSION",
            ErrorCode::DeviceRemoved => "E_DEVICE_REMOVED",
            ErrorCode::NoAudioDevice => "E_NO_AUDIO_DEVICE",
            ErrorCode::RecordingFailed => "E_RECORDING_FAILED",
            ErrorCode::TranscriptionFailed => "E_TRANSCRIPTION_FAILED",
            ErrorCode::TranscriptionTimeout => "E_TRANSCRIPTION_TIMEOUT",
            ErrorCode::ModelNotReady => "E_MODEL_NOT_READY",
            ErrorCode::ModelDownloadFailed => "E_MODEL_DOWNLOAD",
            ErrorCode::DiskFull => "E_DISK_FULL",
            ErrorCode::CacheCorrupt => "E_CACHE_CORRUPT",
            ErrorCode::Network => "E_NETWORK",
            ErrorCode::InjectionFailed => "E_INJECTION_FAILED",
            ErrorCode::OverlayFailed => "E_OVERLAY_FAILED",
            ErrorCode::UnsupportedLanguage => "E_LANGUAGE_UNSUPPORTED",
            ErrorCode::Internal => "E_INTERNAL",
        }
    }

    /// Parse a wire code. Accepts the `E_` prefix or bare kind names in any case
    /// with `-` or `_` separators. Anything unrecognized is `Internal`.
    pub fn from_wire(raw: &str) -> Self {
        let upper = raw.trim().to_ascii_uppercase().replace('-', "_");
        let key = upper.strip_prefix("E_").unwrap_or(&upper);
        match key {
            "SIDECAR_SPAWN" | "WORKER_SPAWN" => ErrorCode::SidecarSpawn,
            "SIDECAR_IPC" | "WORKER_IPC" => ErrorCode::SidecarIpc,
            "SIDECAR_CRASH" | "WORKER_CRASH" => ErrorCode::SidecarCrash,
            "SIDECAR_CIRCUIT_BREAKER" | "SIDECAR_CIRCUIT_OPEN" | "CIRCUIT_BREAKER" => {
                ErrorCode::SidecarCircuitBreaker
            }
            "MIC_PERMISSION" | "MICROPHONE_PERMISSION" | "PERMISSION_DENIED" => {
                ErrorCode::MicPermissionDenied
            }
            "DEVICE_REMOVED" | "DEVICE_NOT_FOUND" => ErrorCode::DeviceRemoved,
            "NO_AUDIO_DEVICE" | "NO_DEVICE" => ErrorCode::NoAudioDevice,
            "RECORDING_FAILED" | "RECORDING" => ErrorCode::RecordingFailed,
            "TRANSCRIPTION_FAILED" | "TRANSCRIPTION" | "ASR_FAILED" => {
                ErrorCode::TranscriptionFailed
            }
            "TRANSCRIPTION_TIMEOUT" | "TIMEOUT" => ErrorCode::TranscriptionTimeout,
            "MODEL_NOT_READY" => ErrorCode::ModelNotReady,
            "MODEL_DOWNLOAD" | "MODEL_DOWNLOAD_FAILED" => ErrorCode::ModelDownloadFailed,
            "DISK_FULL" => ErrorCode::DiskFull,
            "CACHE_CORRUPT" => ErrorCode::CacheCorrupt,
            "NETWORK" | "NETWORK_FAILURE" => ErrorCode::Network,
            "INJECTION_FAILED" | "INJECTION" => ErrorCode::InjectionFailed,
            "OVERLAY_FAILED" | "OVERLAY" => ErrorCode::OverlayFailed,
            "LANGUAGE_UNSUPPORTED" | "UNSUPPORTED_LANGUAGE" => ErrorCode::UnsupportedLanguage,
            _ => ErrorCode::Internal,
        }
    }

    /// Recoverability assumed for errors raised locally (not read off a payload).
    pub fn default_recoverable(&self) -> bool {
        !matches!(
            self,
            ErrorCode::SidecarCircuitBreaker
                | ErrorCode::UnsupportedLanguage
                | ErrorCode::Internal
        )
    }

    /// Whether the worker process is implicated.
    pub fn is_worker_fault(&self) -> bool {
        matches!(
            self,
            ErrorCode::SidecarSpawn
                | ErrorCode::SidecarIpc
                | ErrorCode::SidecarCrash
                | ErrorCode::SidecarCircuitBreaker
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

impl From<String> for ErrorCode {
    fn from(raw: String) -> Self {
        ErrorCode::from_wire(&raw)
    }
}

impl From<ErrorCode> for String {
    fn from(code: ErrorCode) -> Self {
        code.as_wire().to_string()
    }
}

/// A normalized, user-facing error.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub code: ErrorCode,
    pub message: String,
    pub recoverable: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recovery_actions: Vec<String>,
}

// =============================================================================
// Audio and self-check
// =============================================================================

/// Live microphone level, normalized to `[0, 1]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioLevel {
    pub rms: f32,
    pub peak: f32,
}

/// Result of one self-check probe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckStatus::Ok => f.write_str("ok"),
            CheckStatus::Warning => f.write_str("warning"),
            CheckStatus::Error => f.write_str("error"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckItem {
    pub status: CheckStatus,
    pub message: String,
}

impl CheckItem {
    pub fn new(status: CheckStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

/// Health probe across the dictation subsystems.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfCheckResult {
    pub hotkey: CheckItem,
    pub injection: CheckItem,
    pub microphone: CheckItem,
    pub sidecar: CheckItem,
    pub model: CheckItem,
}

impl SelfCheckResult {
    /// Items paired with their subsystem name, in report order.
    pub fn items(&self) -> [(&'static str, &CheckItem); 5] {
        [
            ("hotkey", &self.hotkey),
            ("injection", &self.injection),
            ("microphone", &self.microphone),
            ("sidecar", &self.sidecar),
            ("model", &self.model),
        ]
    }

    /// The worst status across all items.
    pub fn overall(&self) -> CheckStatus {
        let statuses = self.items().map(|(_, item)| item.status);
        if statuses.contains(&CheckStatus::Error) {
            CheckStatus::Error
        } else if statuses.contains(&CheckStatus::Warning) {
            CheckStatus::Warning
        } else {
            CheckStatus::Ok
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_from_phase() {
        assert_eq!(AppState::from_phase("recording"), Some(AppState::Recording));
        assert_eq!(AppState::from_phase("Transcribing"), Some(AppState::Transcribing));
        assert_eq!(AppState::from_phase("loading_model"), Some(AppState::LoadingModel));
        assert_eq!(AppState::from_phase(" idle "), Some(AppState::Idle));
        assert_eq!(AppState::from_phase("error"), Some(AppState::Error));
        assert_eq!(AppState::from_phase("paused"), None);
        assert_eq!(AppState::from_phase(""), None);
    }

    #[test]
    fn test_app_state_serde_names() {
        let json = serde_json::to_string(&AppState::LoadingModel).unwrap();
        assert_eq!(json, "\"loading_model\"");
        assert_eq!(AppState::LoadingModel.to_string(), "loading_model");
    }

    #[test]
    fn test_display_server_tagged_serde() {
        let wayland = DisplayServer::Wayland {
            compositor: Some("sway".into()),
        };
        let json = serde_json::to_value(&wayland).unwrap();
        assert_eq!(json["kind"], "wayland");
        assert_eq!(json["compositor"], "sway");

        let parsed: DisplayServer = serde_json::from_str(r#"{"kind":"x11"}"#).unwrap();
        assert_eq!(parsed, DisplayServer::X11);

        let bare: DisplayServer = serde_json::from_str(r#"{"kind":"wayland"}"#).unwrap();
        assert_eq!(bare, DisplayServer::Wayland { compositor: None });
    }

    #[test]
    fn test_model_lifecycle_aliases() {
        assert_eq!(ModelLifecycle::from_wire("INSTALLING"), ModelLifecycle::Loading);
        assert_eq!(ModelLifecycle::from_wire("available"), ModelLifecycle::Missing);
        assert_eq!(ModelLifecycle::from_wire("Ready"), ModelLifecycle::Ready);
        assert_eq!(ModelLifecycle::from_wire("verifying"), ModelLifecycle::Verifying);
        assert_eq!(ModelLifecycle::from_wire("teleporting"), ModelLifecycle::Unknown);
    }

    #[test]
    fn test_sidecar_state_from_wire() {
        assert_eq!(SidecarState::from_wire("ready"), Some(SidecarState::Ready));
        assert_eq!(SidecarState::from_wire("RESTARTING"), Some(SidecarState::Restarting));
        assert_eq!(SidecarState::from_wire("failed"), Some(SidecarState::Failed));
        assert_eq!(SidecarState::from_wire("sleeping"), None);
    }

    #[test]
    fn test_sidecar_recovery_needed() {
        let mut status = SidecarStatus::default();
        assert!(!status.recovery_needed());
        status.state = SidecarState::Restarting;
        assert!(status.recovery_needed());
        status.state = SidecarState::Failed;
        assert!(status.recovery_needed());
    }

    #[test]
    fn test_error_code_wire_round_trip() {
        for code in ErrorCode::ALL {
            assert_eq!(ErrorCode::from_wire(code.as_wire()), code);
        }
    }

    #[test]
    fn test_error_code_aliases() {
        assert_eq!(ErrorCode::from_wire("network"), ErrorCode::Network);
        assert_eq!(ErrorCode::from_wire("e-device-not-found"), ErrorCode::DeviceRemoved);
        assert_eq!(ErrorCode::from_wire("E_PERMISSION_DENIED"), ErrorCode::MicPermissionDenied);
        assert_eq!(ErrorCode::from_wire("E_SOMETHING_NEW"), ErrorCode::Internal);
    }

    #[test]
    fn test_error_code_serde_uses_wire_strings() {
        let json = serde_json::to_string(&ErrorCode::DiskFull).unwrap();
        assert_eq!(json, "\"E_DISK_FULL\"");
        let parsed: ErrorCode = serde_json::from_str("\"E_CACHE_CORRUPT\"").unwrap();
        assert_eq!(parsed, ErrorCode::CacheCorrupt);
    }

    #[test]
    fn test_injection_result_tagging() {
        let result = InjectionResult::ClipboardOnly {
            reason: "focus changed".into(),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "clipboard_only");
        assert_eq!(json["reason"], "focus changed");
    }

    #[test]
    fn test_self_check_overall() {
        let ok = CheckItem::new(CheckStatus::Ok, "fine");
        let mut result = SelfCheckResult {
            hotkey: ok.clone(),
            injection: ok.clone(),
            microphone: ok.clone(),
            sidecar: ok.clone(),
            model: ok,
        };
        assert_eq!(result.overall(), CheckStatus::Ok);
        result.model = CheckItem::new(CheckStatus::Warning, "downloading");
        assert_eq!(result.overall(), CheckStatus::Warning);
        result.sidecar = CheckItem::new(CheckStatus::Error, "crashed");
        assert_eq!(result.overall(), CheckStatus::Error);
    }

    #[test]
    fn test_effective_mode_overridden() {
        let honoured = EffectiveMode::honoured(ActivationMode::Hold);
        assert!(!honoured.is_overridden());
        let forced = EffectiveMode {
            configured: ActivationMode::Hold,
            effective: ActivationMode::Toggle,
            reason: Some("no release events".into()),
        };
        assert!(forced.is_overridden());
    }
}
