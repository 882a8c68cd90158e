//! The state reconciler: single owner of the application snapshot.
//!
//! Events from the platform layer and the recognition worker are folded in by
//! [`StateReconciler::apply`], a synchronous reducer. Commands call out to the
//! [`PlatformHost`] and merge their effect into the snapshot only once the host
//! call has succeeded, always against the snapshot as it is *after* the call.
//! No command error escapes as a panic or an engine error: failures become
//! `AppState::Error` plus a normalized [`ErrorEnvelope`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use vocalis_core::config::VocalisConfig;
use vocalis_core::error::Result;
use vocalis_core::events::{AudioLevelPayload, InboundEvent, SidecarStatusPayload};
use vocalis_core::types::{
    AppState, AudioLevel, Capabilities, CheckItem, CheckStatus, ErrorCode, ErrorEnvelope,
    ModelLifecycle, ModelStatus, SelfCheckResult, SidecarState, SidecarStatus, TranscriptEntry,
};
use vocalis_core::user_config::{ConfigSection, ReplacementRule, UserConfig};
use vocalis_core::ModelStatusUpdate;

use crate::capability::PlatformReport;
use crate::diagnostics::{DiagnosticsComposer, DiagnosticsInput};
use crate::error_normalizer::{local_error, normalize_error};
use crate::host::{HostError, PlatformHost};
use crate::model_status::{DownloadEstimate, ModelStatusTracker, ModelUpdateOutcome};
use crate::sidecar::SidecarHealthMonitor;
use crate::state::{Lifecycle, PhaseOutcome};
use crate::transcript::{normalize_entry, History};

/// Outcome of a command. The error side is already reflected in the snapshot.
pub type CommandResult<T> = std::result::Result<T, ErrorEnvelope>;

/// Read-only copy of everything the engine knows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub app_state: AppState,
    pub error: Option<ErrorEnvelope>,
    pub active_session: Option<String>,
    pub capabilities: Option<Capabilities>,
    pub model: ModelStatus,
    pub download: DownloadEstimate,
    pub sidecar: SidecarStatus,
    pub recovery_needed: bool,
    pub audio_level: Option<AudioLevel>,
    pub mic_test_active: bool,
    pub history: Vec<TranscriptEntry>,
    pub self_check: Option<SelfCheckResult>,
    pub config: UserConfig,
}

// =============================================================================
// Owned state
// =============================================================================

#[derive(Debug)]
struct EngineState {
    lifecycle: Lifecycle,
    platform: Option<PlatformReport>,
    capabilities: Option<Capabilities>,
    model: ModelStatusTracker,
    sidecar: SidecarHealthMonitor,
    audio_level: Option<AudioLevel>,
    mic_test_active: bool,
    history: History,
    self_check: Option<SelfCheckResult>,
    config: UserConfig,
}

impl EngineState {
    fn new(engine: &VocalisConfig, config: UserConfig) -> Self {
        let model_id = config.model_id_or(&engine.model.default_model_id).to_string();
        Self {
            lifecycle: Lifecycle::new(),
            platform: None,
            capabilities: None,
            model: ModelStatusTracker::new(model_id),
            sidecar: SidecarHealthMonitor::new(),
            audio_level: None,
            mic_test_active: false,
            history: History::new(history_bound(engine, &config)),
            self_check: None,
            config,
        }
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            app_state: self.lifecycle.state(),
            error: self.lifecycle.error().cloned(),
            active_session: self.lifecycle.active_session().map(ToOwned::to_owned),
            capabilities: self.capabilities.clone(),
            model: self.model.status().clone(),
            download: self.model.estimate(),
            sidecar: self.sidecar.status().clone(),
            recovery_needed: self.sidecar.recovery_needed(),
            audio_level: self.audio_level,
            mic_test_active: self.mic_test_active,
            history: self.history.to_vec(),
            self_check: self.self_check.clone(),
            config: self.config.clone(),
        }
    }

    /// Propagate a configuration change into everything derived from it.
    fn config_changed(&mut self, engine: &VocalisConfig) {
        self.resolve_capabilities();
        let model_id = self
            .config
            .model_id_or(&engine.model.default_model_id)
            .to_string();
        self.model.set_model_id(&model_id);
        self.settle_model_loading();
        self.history.set_max_entries(history_bound(engine, &self.config));
    }

    /// Leave `LoadingModel` once the tracked model is no longer loading.
    fn settle_model_loading(&mut self) {
        if self.lifecycle.state() == AppState::LoadingModel
            && self.model.status().status != ModelLifecycle::Loading
        {
            debug!(model = %self.model.status().status, "Model no longer loading");
            self.lifecycle.enter(AppState::Idle);
        }
    }

    fn resolve_capabilities(&mut self) {
        if let Some(report) = &self.platform {
            self.capabilities =
                Some(report.resolve(self.config.hotkey.mode, self.config.injection.method));
        }
    }

    fn fail(&mut self, command: &str, envelope: ErrorEnvelope) -> ErrorEnvelope {
        warn!(
            command,
            code = %envelope.code,
            "Command failed: {}",
            envelope.message
        );
        self.lifecycle.fail(envelope.clone());
        envelope
    }

    fn apply_model_status(&mut self, update: &ModelStatusUpdate) -> bool {
        let before = self.model.status().status;
        if self.model.apply(update) != ModelUpdateOutcome::Applied {
            return false;
        }
        let after = self.model.status().status;
        let app_state = self.lifecycle.state();

        match after {
            ModelLifecycle::Loading if app_state == AppState::Idle => {
                self.lifecycle.enter(AppState::LoadingModel);
            }
            ModelLifecycle::Ready if self.lifecycle.error().is_some_and(is_model_error) => {
                self.lifecycle.clear_error();
            }
            ModelLifecycle::Error if before != ModelLifecycle::Error => {
                let code = if before.is_transferring() {
                    ErrorCode::ModelDownloadFailed
                } else {
                    ErrorCode::ModelNotReady
                };
                let status = self.model.status();
                let message = status
                    .error
                    .clone()
                    .unwrap_or_else(|| format!("Model {} failed to load", status.model_id));
                self.lifecycle.fail(local_error(code, message));
            }
            _ => {}
        }
        self.settle_model_loading();
        true
    }

    fn apply_sidecar_status(&mut self, payload: &SidecarStatusPayload) -> bool {
        let transition = self.sidecar.apply(payload);
        let worker_error = self
            .lifecycle
            .error()
            .is_some_and(|e| e.code.is_worker_fault());

        if transition.recovered() && worker_error {
            info!("Recognition worker recovered, clearing worker error");
            self.lifecycle.clear_error();
        } else if transition.current == SidecarState::Failed
            && transition.previous != SidecarState::Failed
        {
            let message = payload
                .message
                .clone()
                .unwrap_or_else(|| "The recognition worker stopped restarting".to_string());
            self.lifecycle
                .fail(local_error(ErrorCode::SidecarCircuitBreaker, message));
        } else if transition.current == SidecarState::Restarting && self.lifecycle.state().is_busy()
        {
            self.lifecycle.fail(local_error(
                ErrorCode::SidecarCrash,
                "The recognition worker restarted during dictation",
            ));
        }
        true
    }

    fn apply_audio_level(&mut self, payload: &AudioLevelPayload) -> bool {
        let from_recording = payload.source.as_deref() == Some("recording");
        if from_recording && self.lifecycle.is_stale_session(payload.session_id.as_deref()) {
            debug!(session_id = ?payload.session_id, "Dropping audio level from stale session");
            return false;
        }
        let sane = |v: f64| v.is_finite() && v >= 0.0;
        if !sane(payload.rms) || !sane(payload.peak) {
            debug!(rms = payload.rms, peak = payload.peak, "Dropping invalid audio level");
            return false;
        }
        self.audio_level = Some(AudioLevel {
            rms: payload.rms.min(1.0) as f32,
            peak: payload.peak.min(1.0) as f32,
        });
        true
    }

    /// Model item derived from tracked status, for hosts that do not report one.
    fn model_check_item(&self) -> CheckItem {
        let model = self.model.status();
        let status = match model.status {
            ModelLifecycle::Ready => CheckStatus::Ok,
            ModelLifecycle::Missing | ModelLifecycle::Error => CheckStatus::Error,
            _ => CheckStatus::Warning,
        };
        CheckItem::new(status, format!("Model {} is {}", model.model_id, model.status))
    }
}

fn history_bound(engine: &VocalisConfig, config: &UserConfig) -> usize {
    config
        .history
        .max_entries
        .unwrap_or(engine.history.fallback_max_entries)
}

fn is_model_error(envelope: &ErrorEnvelope) -> bool {
    matches!(
        envelope.code,
        ErrorCode::ModelNotReady | ErrorCode::ModelDownloadFailed
    )
}

fn outcome_applied(outcome: PhaseOutcome) -> bool {
    !matches!(
        outcome,
        PhaseOutcome::Unmapped | PhaseOutcome::StaleSession | PhaseOutcome::StaleSeq
    )
}

// =============================================================================
// Reconciler
// =============================================================================

/// Owns the canonical snapshot. Clone the `Arc` to share it.
pub struct StateReconciler {
    host: Arc<dyn PlatformHost>,
    engine: VocalisConfig,
    composer: DiagnosticsComposer,
    state: Mutex<EngineState>,
}

impl std::fmt::Debug for StateReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateReconciler")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl StateReconciler {
    pub fn new(host: Arc<dyn PlatformHost>, engine: VocalisConfig, config: UserConfig) -> Self {
        let state = EngineState::new(&engine, config);
        Self {
            host,
            composer: DiagnosticsComposer::new(engine.diagnostics.clone()),
            engine,
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current read-only copy of the snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.lock().snapshot()
    }

    pub fn app_state(&self) -> AppState {
        self.lock().lifecycle.state()
    }

    // -------------------------------------------------------------------------
    // Events
    // -------------------------------------------------------------------------

    /// Decode and apply a raw `(topic, payload)` pair.
    pub fn apply_raw(&self, topic: &str, payload: Value) -> Result<bool> {
        let event = InboundEvent::decode(topic, payload)?;
        Ok(self.apply(event))
    }

    /// Fold one event into the snapshot. Returns whether anything was applied.
    pub fn apply(&self, event: InboundEvent) -> bool {
        let topic = event.topic();
        let mut state = self.lock();
        let applied = match event {
            InboundEvent::StateChanged(payload) => outcome_applied(state.lifecycle.apply_phase(
                &payload.state,
                None,
                None,
                payload.error_detail(),
            )),
            InboundEvent::RecordingStatus(payload) => {
                outcome_applied(state.lifecycle.apply_phase(
                    &payload.phase,
                    payload.session_id.as_deref(),
                    payload.seq,
                    payload.error_detail(),
                ))
            }
            InboundEvent::ModelStatus(update) => state.apply_model_status(&update),
            InboundEvent::AudioLevel(payload) => state.apply_audio_level(&payload),
            InboundEvent::TranscriptComplete(payload) => {
                let entry = normalize_entry(payload.entry);
                info!(entry_id = %entry.id, chars = entry.text.chars().count(), "Transcript added");
                state.history.push(entry);
                true
            }
            InboundEvent::TranscriptError(payload) => {
                if state.lifecycle.is_stale_session(payload.session_id.as_deref()) {
                    debug!(session_id = ?payload.session_id, "Dropping error from stale session");
                    false
                } else {
                    let envelope = normalize_error(&payload.error);
                    warn!(code = %envelope.code, "Transcription failed: {}", envelope.message);
                    state.lifecycle.fail(envelope);
                    true
                }
            }
            InboundEvent::AppError(payload) => {
                let envelope = normalize_error(&payload);
                warn!(code = %envelope.code, "Application error: {}", envelope.message);
                state.lifecycle.fail(envelope);
                true
            }
            InboundEvent::SidecarStatus(payload) => state.apply_sidecar_status(&payload),
        };
        debug!(%topic, applied, app_state = %state.lifecycle.state(), "Event reconciled");
        applied
    }

    // -------------------------------------------------------------------------
    // Commands
    // -------------------------------------------------------------------------

    fn host_failed(&self, command: &str, error: HostError) -> ErrorEnvelope {
        let envelope = normalize_error(&error.payload);
        self.lock().fail(command, envelope)
    }

    fn reject(&self, command: &str, envelope: ErrorEnvelope) -> ErrorEnvelope {
        self.lock().fail(command, envelope)
    }

    /// Ask the platform what it can do and resolve effective modes.
    pub async fn refresh_capabilities(&self) -> CommandResult<Capabilities> {
        let report = self
            .host
            .probe_platform()
            .await
            .map_err(|e| self.host_failed("refresh_capabilities", e))?;

        let mut state = self.lock();
        let caps = report.resolve(state.config.hotkey.mode, state.config.injection.method);
        if let Some(reason) = caps.hotkey_mode.reason.as_deref() {
            info!(display_server = %caps.display_server, "Hotkey mode overridden: {}", reason);
        }
        if let Some(reason) = caps.injection_method.reason.as_deref() {
            info!(display_server = %caps.display_server, "Injection overridden: {}", reason);
        }
        state.platform = Some(report);
        state.capabilities = Some(caps.clone());
        Ok(caps)
    }

    /// Start recording. Refused locally while the configured model is unusable.
    pub async fn start_recording(&self) -> CommandResult<()> {
        let blocked = {
            let state = self.lock();
            state.model.blocks_recording().then(|| {
                let model = state.model.status();
                format!("Model {} is {}", model.model_id, model.status)
            })
        };
        if let Some(message) = blocked {
            return Err(self.reject(
                "start_recording",
                local_error(ErrorCode::ModelNotReady, message),
            ));
        }

        self.host
            .start_recording()
            .await
            .map_err(|e| self.host_failed("start_recording", e))?;
        info!("Recording requested");
        Ok(())
    }

    pub async fn stop_recording(&self) -> CommandResult<()> {
        self.host
            .stop_recording()
            .await
            .map_err(|e| self.host_failed("stop_recording", e))?;
        info!("Recording stop requested");
        Ok(())
    }

    /// Discard the current recording. The snapshot returns to idle on success.
    pub async fn cancel_recording(&self) -> CommandResult<()> {
        self.host
            .cancel_recording()
            .await
            .map_err(|e| self.host_failed("cancel_recording", e))?;

        let mut state = self.lock();
        if state.lifecycle.state().is_busy() {
            state.lifecycle.enter(AppState::Idle);
        }
        info!("Recording cancelled");
        Ok(())
    }

    /// Switch input device, cycling a running level meter around the change.
    ///
    /// The device is applied to the snapshot optimistically and rolled back if
    /// the host refuses it, in which case the meter is restarted on the
    /// previous device.
    pub async fn set_audio_device(&self, device_uid: Option<String>) -> CommandResult<()> {
        let previous = {
            let mut state = self.lock();
            let previous = state.config.audio.device_uid.clone();
            state.config.audio.device_uid = device_uid.clone();
            previous
        };

        let meter_paused = self.pause_meter().await;

        match self.host.set_audio_device(device_uid.as_deref()).await {
            Ok(()) => {
                info!(has_device = device_uid.is_some(), "Audio device changed");
                if meter_paused {
                    self.restart_meter(device_uid.as_deref()).await;
                }
                Ok(())
            }
            Err(e) => {
                {
                    let mut state = self.lock();
                    if state.config.audio.device_uid == device_uid {
                        state.config.audio.device_uid = previous.clone();
                    }
                }
                if meter_paused {
                    self.restart_meter(previous.as_deref()).await;
                }
                Err(self.host_failed("set_audio_device", e))
            }
        }
    }

    /// Stop a running level meter ahead of a device change.
    ///
    /// Returns whether it was stopped and must be restarted afterwards. A meter
    /// the host failed to stop is still reported as running.
    async fn pause_meter(&self) -> bool {
        if !self.lock().mic_test_active {
            return false;
        }
        match self.host.stop_mic_test().await {
            Ok(()) => {
                let mut state = self.lock();
                state.mic_test_active = false;
                state.audio_level = None;
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to stop level meter before device change");
                false
            }
        }
    }

    async fn restart_meter(&self, device_uid: Option<&str>) {
        match self.host.start_mic_test(device_uid).await {
            Ok(()) => self.lock().mic_test_active = true,
            Err(e) => warn!(error = %e, "Failed to restart level meter"),
        }
    }

    pub async fn start_mic_test(&self) -> CommandResult<()> {
        let device_uid = self.lock().config.audio.device_uid.clone();
        self.host
            .start_mic_test(device_uid.as_deref())
            .await
            .map_err(|e| self.host_failed("start_mic_test", e))?;
        self.lock().mic_test_active = true;
        Ok(())
    }

    pub async fn stop_mic_test(&self) -> CommandResult<()> {
        self.host
            .stop_mic_test()
            .await
            .map_err(|e| self.host_failed("stop_mic_test", e))?;
        let mut state = self.lock();
        state.mic_test_active = false;
        state.audio_level = None;
        Ok(())
    }

    /// Deep-merge `partial` into one configuration section.
    ///
    /// Validated against the current snapshot before the host is called, then
    /// merged again into whatever the snapshot holds once the host succeeds.
    pub async fn update_config(&self, section: &str, partial: Value) -> CommandResult<UserConfig> {
        let Some(section) = ConfigSection::from_name(section) else {
            let message = format!("Unknown configuration section `{}`", section);
            return Err(self.reject("update_config", local_error(ErrorCode::Internal, message)));
        };

        let validated = self.lock().config.merged_with(section, &partial);
        if let Err(e) = validated {
            return Err(self.reject("update_config", local_error(ErrorCode::Internal, e.to_string())));
        }

        // A device change cycles a running level meter, as in set_audio_device.
        let device_change = section == ConfigSection::Audio && partial.get("device_uid").is_some();
        let meter_paused = device_change && self.pause_meter().await;

        if let Err(e) = self.host.update_config(section, &partial).await {
            if meter_paused {
                let current = self.lock().config.audio.device_uid.clone();
                self.restart_meter(current.as_deref()).await;
            }
            return Err(self.host_failed("update_config", e));
        }

        let result = {
            let mut state = self.lock();
            match state.config.merged_with(section, &partial) {
                Ok(merged) => {
                    state.config = merged.clone();
                    state.config_changed(&self.engine);
                    info!(%section, "Configuration updated");
                    Ok(merged)
                }
                Err(e) => Err(state.fail(
                    "update_config",
                    local_error(ErrorCode::Internal, e.to_string()),
                )),
            }
        };
        if meter_paused {
            let current = self.lock().config.audio.device_uid.clone();
            self.restart_meter(current.as_deref()).await;
        }
        result
    }

    pub async fn set_replacement_rules(&self, rules: Vec<ReplacementRule>) -> CommandResult<()> {
        self.host
            .set_replacement_rules(&rules)
            .await
            .map_err(|e| self.host_failed("set_replacement_rules", e))?;

        let mut state = self.lock();
        info!(count = rules.len(), "Replacement rules updated");
        state.config = state.config.with_replacements(rules);
        Ok(())
    }

    /// Download a model, defaulting to the configured one.
    pub async fn download_model(&self, model_id: Option<String>) -> CommandResult<()> {
        let model_id = model_id.unwrap_or_else(|| self.lock().model.model_id().to_string());
        self.host
            .download_model(&model_id)
            .await
            .map_err(|e| self.host_failed("download_model", e))?;
        info!(model_id = %model_id, "Model download requested");
        Ok(())
    }

    /// Delete cached model files, defaulting to the configured model.
    pub async fn purge_model_cache(&self, model_id: Option<String>) -> CommandResult<()> {
        let model_id = model_id.unwrap_or_else(|| self.lock().model.model_id().to_string());
        self.host
            .purge_model_cache(&model_id)
            .await
            .map_err(|e| self.host_failed("purge_model_cache", e))?;

        let mut state = self.lock();
        if state.model.model_id() == model_id {
            state.model.mark_missing();
            state.settle_model_loading();
        }
        info!(model_id = %model_id, "Model cache purged");
        Ok(())
    }

    pub async fn restart_sidecar(&self) -> CommandResult<()> {
        let monitor = self.lock().sidecar.clone();
        monitor
            .restart(self.host.as_ref())
            .await
            .map_err(|e| self.host_failed("restart_sidecar", e))
    }

    pub async fn run_self_check(&self) -> CommandResult<SelfCheckResult> {
        let report = self
            .host
            .run_self_check()
            .await
            .map_err(|e| self.host_failed("run_self_check", e))?;

        let mut state = self.lock();
        let model = report.model.unwrap_or_else(|| state.model_check_item());
        let result = SelfCheckResult {
            hotkey: report.hotkey,
            injection: report.injection,
            microphone: report.microphone,
            sidecar: report.sidecar,
            model,
        };
        info!(overall = %result.overall(), "Self-check finished");
        state.self_check = Some(result.clone());
        Ok(result)
    }

    pub async fn get_recent_logs(&self, count: usize) -> CommandResult<Vec<String>> {
        self.host
            .get_recent_logs(count)
            .await
            .map_err(|e| self.host_failed("get_recent_logs", e))
    }

    /// Compose the redacted, size-bounded diagnostics report.
    ///
    /// Host sections that cannot be fetched are noted in the report rather than
    /// failing the whole command.
    pub async fn generate_diagnostics(&self) -> String {
        let platform_text = match self.host.platform_diagnostics().await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Platform diagnostics unavailable");
                format!("<unavailable: {}>", normalize_error(&e.payload).message)
            }
        };
        let recent_logs = match self
            .host
            .get_recent_logs(self.engine.diagnostics.recent_log_lines)
            .await
        {
            Ok(lines) => lines,
            Err(e) => {
                warn!(error = %e, "Recent logs unavailable");
                vec![format!("<unavailable: {}>", normalize_error(&e.payload).message)]
            }
        };

        let state = self.lock();
        self.composer.compose(&DiagnosticsInput {
            generated_at: Utc::now(),
            app_state: state.lifecycle.state(),
            capabilities: state.capabilities.as_ref(),
            self_check: state.self_check.as_ref(),
            model: state.model.status(),
            sidecar: state.sidecar.status(),
            config: &state.config,
            platform_text: &platform_text,
            recent_logs: &recent_logs,
        })
    }
}
