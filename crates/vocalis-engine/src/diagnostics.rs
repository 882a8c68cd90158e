//! Plain-text diagnostics report.
//!
//! The report is redacted as a whole and only then cut to size, so a home path
//! straddling the cut can never leak a partial username. Transcript text and
//! device identifiers never enter the report.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde_json::Value;
use vocalis_core::config::DiagnosticsConfig;
use vocalis_core::redact::sanitize_report;
use vocalis_core::types::{AppState, Capabilities, ModelStatus, SelfCheckResult, SidecarStatus};
use vocalis_core::user_config::UserConfig;

/// Placeholder written in place of a configured audio device id.
pub const DEVICE_PLACEHOLDER: &str = "<device>";

/// Everything the report is built from.
#[derive(Debug, Clone)]
pub struct DiagnosticsInput<'a> {
    pub generated_at: DateTime<Utc>,
    pub app_state: AppState,
    pub capabilities: Option<&'a Capabilities>,
    pub self_check: Option<&'a SelfCheckResult>,
    pub model: &'a ModelStatus,
    pub sidecar: &'a SidecarStatus,
    pub config: &'a UserConfig,
    pub platform_text: &'a str,
    pub recent_logs: &'a [String],
}

#[derive(Debug, Clone)]
pub struct DiagnosticsComposer {
    config: DiagnosticsConfig,
}

impl DiagnosticsComposer {
    pub fn new(config: DiagnosticsConfig) -> Self {
        Self { config }
    }

    /// Build, redact and bound the report.
    pub fn compose(&self, input: &DiagnosticsInput<'_>) -> String {
        let mut report = String::new();
        write_header(&mut report, input);
        write_capabilities(&mut report, input.capabilities);
        write_self_check(&mut report, input.self_check);
        write_model(&mut report, input.model, input.sidecar);
        write_config(&mut report, input.config);

        section(&mut report, "Platform");
        report.push_str(input.platform_text.trim_end());
        report.push('\n');

        section(&mut report, "Recent logs");
        for line in input.recent_logs {
            report.push_str(line.trim_end());
            report.push('\n');
        }

        sanitize_report(&report, &self.config.home_placeholder, self.config.max_chars)
    }
}

/// Configuration with device ids masked and replacement rules reduced to a count.
pub fn redacted_config(config: &UserConfig) -> Value {
    let mut value = serde_json::to_value(config).unwrap_or(Value::Null);
    if let Some(device) = value.pointer_mut("/audio/device_uid") {
        if !device.is_null() {
            *device = Value::String(DEVICE_PLACEHOLDER.to_string());
        }
    }
    if let Some(rules) = value.get_mut("replacements") {
        *rules = Value::from(config.replacements.len());
    }
    value
}

fn section(report: &mut String, title: &str) {
    let _ = write!(report, "\n=== {} ===\n", title);
}

fn write_header(report: &mut String, input: &DiagnosticsInput<'_>) {
    let _ = writeln!(report, "Vocalis diagnostics v{}", env!("CARGO_PKG_VERSION"));
    let _ = writeln!(report, "generated_at: {}", input.generated_at.to_rfc3339());
    let _ = writeln!(report, "app_state: {}", input.app_state);
}

fn write_capabilities(report: &mut String, caps: Option<&Capabilities>) {
    section(report, "Capabilities");
    let Some(caps) = caps else {
        report.push_str("not probed\n");
        return;
    };
    let _ = writeln!(report, "display_server: {}", caps.display_server);
    let probe = &caps.probe;
    let _ = writeln!(
        report,
        "hotkey_press: {}, hotkey_release: {}, keystroke_injection: {}, clipboard: {}, paste_synthesis: {}",
        probe.hotkey_press_available,
        probe.hotkey_release_available,
        probe.keystroke_injection_available,
        probe.clipboard_available,
        probe.paste_synthesis_available
    );
    let _ = writeln!(
        report,
        "permissions: microphone={:?}, accessibility={:?}",
        caps.microphone_permission, caps.accessibility_permission
    );
    let _ = writeln!(
        report,
        "hotkey_mode: configured={} effective={}{}",
        caps.hotkey_mode.configured,
        caps.hotkey_mode.effective,
        reason_suffix(caps.hotkey_mode.reason.as_deref())
    );
    let _ = writeln!(
        report,
        "injection_method: configured={} effective={}{}",
        caps.injection_method.configured,
        caps.injection_method.effective,
        reason_suffix(caps.injection_method.reason.as_deref())
    );
}

fn reason_suffix(reason: Option<&str>) -> String {
    reason.map(|r| format!(" ({})", r)).unwrap_or_default()
}

fn write_self_check(report: &mut String, check: Option<&SelfCheckResult>) {
    section(report, "Self-check");
    let Some(check) = check else {
        report.push_str("not run\n");
        return;
    };
    let _ = writeln!(report, "overall: {}", check.overall());
    for (name, item) in check.items() {
        let _ = writeln!(report, "{}: {} - {}", name, item.status, item.message);
    }
}

fn write_model(report: &mut String, model: &ModelStatus, sidecar: &SidecarStatus) {
    section(report, "Model");
    let _ = writeln!(report, "model_id: {}", model.model_id);
    let _ = writeln!(report, "status: {}", model.status);
    if let Some(revision) = &model.revision {
        let _ = writeln!(report, "revision: {}", revision);
    }
    if let Some(path) = &model.cache_path {
        let _ = writeln!(report, "cache_path: {}", path);
    }
    if let Some(progress) = &model.progress {
        let total = progress
            .total
            .map_or_else(|| "?".to_string(), |t| t.to_string());
        let _ = writeln!(report, "progress: {}/{} {}", progress.current, total, progress.unit);
    }
    if let Some(error) = &model.error {
        let _ = writeln!(report, "error: {}", error);
    }

    section(report, "Worker");
    let _ = writeln!(report, "state: {}", sidecar.state);
    let _ = writeln!(report, "restart_count: {}", sidecar.restart_count);
    if let Some(message) = &sidecar.message {
        let _ = writeln!(report, "message: {}", message);
    }
}

fn write_config(report: &mut String, config: &UserConfig) {
    section(report, "Configuration");
    let rendered = serde_json::to_string_pretty(&redacted_config(config))
        .unwrap_or_else(|e| format!("<unavailable: {}>", e));
    report.push_str(&rendered);
    report.push('\n');
}
