//! Platform capability resolution.
//!
//! Maps what the user asked for (hold or toggle activation, direct or clipboard
//! injection) onto what the platform can actually deliver, with a short
//! explanation whenever the two differ. Everything here is pure.

use serde::{Deserialize, Serialize};
use vocalis_core::types::{
    ActivationMode, Capabilities, DisplayServer, EffectiveMode, InjectionMethod, PermissionState,
    PlatformProbe,
};

/// Effective behavior for one set of inputs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub hotkey_mode: EffectiveMode<ActivationMode>,
    pub injection_method: EffectiveMode<InjectionMethod>,
}

impl Resolution {
    /// Both reasons joined, or `None` when everything was honoured.
    pub fn reason(&self) -> Option<String> {
        let reasons: Vec<&str> = [
            self.hotkey_mode.reason.as_deref(),
            self.injection_method.reason.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect();
        if reasons.is_empty() {
            None
        } else {
            Some(reasons.join("; "))
        }
    }
}

/// Resolve the effective hotkey mode and injection method.
pub fn resolve(
    display_server: &DisplayServer,
    requested_mode: ActivationMode,
    requested_injection: InjectionMethod,
    probe: &PlatformProbe,
) -> Resolution {
    Resolution {
        hotkey_mode: resolve_hotkey_mode(display_server, requested_mode, probe),
        injection_method: resolve_injection(display_server, requested_injection, probe),
    }
}

fn resolve_hotkey_mode(
    display_server: &DisplayServer,
    requested: ActivationMode,
    probe: &PlatformProbe,
) -> EffectiveMode<ActivationMode> {
    let separable = probe.hotkey_press_available && probe.hotkey_release_available;
    match requested {
        ActivationMode::Hold if !separable => EffectiveMode {
            configured: requested,
            effective: ActivationMode::Toggle,
            reason: Some(format!(
                "{} does not report separate key press and release events, so hold-to-talk falls back to toggle",
                display_server
            )),
        },
        _ => EffectiveMode::honoured(requested),
    }
}

fn resolve_injection(
    display_server: &DisplayServer,
    requested: InjectionMethod,
    probe: &PlatformProbe,
) -> EffectiveMode<InjectionMethod> {
    match requested {
        InjectionMethod::Direct if !probe.keystroke_injection_available => EffectiveMode {
            configured: requested,
            effective: InjectionMethod::Clipboard,
            reason: Some(format!(
                "{} does not allow synthetic keystrokes, so transcripts are copied to the clipboard",
                display_server
            )),
        },
        InjectionMethod::ClipboardAutopaste if !probe.paste_synthesis_available => {
            EffectiveMode {
                configured: requested,
                effective: InjectionMethod::Clipboard,
                reason: Some(format!(
                    "{} cannot synthesize a paste shortcut, so transcripts are copied without pasting",
                    display_server
                )),
            }
        }
        _ => EffectiveMode::honoured(requested),
    }
}

/// What the platform-integration layer reports about itself.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformReport {
    pub display_server: DisplayServer,
    pub probe: PlatformProbe,
    pub microphone_permission: PermissionState,
    pub accessibility_permission: PermissionState,
}

impl PlatformReport {
    /// Combine the report with the user's requested modes.
    pub fn resolve(
        &self,
        requested_mode: ActivationMode,
        requested_injection: InjectionMethod,
    ) -> Capabilities {
        let resolution = resolve(
            &self.display_server,
            requested_mode,
            requested_injection,
            &self.probe,
        );
        Capabilities {
            display_server: self.display_server.clone(),
            probe: self.probe,
            microphone_permission: self.microphone_permission,
            accessibility_permission: self.accessibility_permission,
            hotkey_mode: resolution.hotkey_mode,
            injection_method: resolution.injection_method,
        }
    }
}

impl From<&Capabilities> for PlatformReport {
    fn from(caps: &Capabilities) -> Self {
        Self {
            display_server: caps.display_server.clone(),
            probe: caps.probe,
            microphone_permission: caps.microphone_permission,
            accessibility_permission: caps.accessibility_permission,
        }
    }
}
