//! Read-only mirror of the user's dictation preferences.
//!
//! The document itself is persisted by the host application. The engine keeps a
//! copy in its snapshot and only changes it through section-level merges that
//! the host has accepted.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, VocalisError};
use crate::types::{ActivationMode, InjectionMethod};

/// Schema version this build writes.
pub const USER_CONFIG_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    pub schema_version: u32,
    pub audio: AudioSettings,
    pub hotkey: HotkeySettings,
    pub injection: InjectionSettings,
    pub model: ModelSettings,
    pub history: HistorySettings,
    pub replacements: Vec<ReplacementRule>,
    pub presets: PresetSettings,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            schema_version: USER_CONFIG_SCHEMA_VERSION,
            audio: AudioSettings::default(),
            hotkey: HotkeySettings::default(),
            injection: InjectionSettings::default(),
            model: ModelSettings::default(),
            history: HistorySettings::default(),
            replacements: Vec::new(),
            presets: PresetSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Selected input device; `None` means the system default.
    pub device_uid: Option<String>,
    pub audio_cues_enabled: bool,
    pub trim_silence: bool,
    pub vad_enabled: bool,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            device_uid: None,
            audio_cues_enabled: true,
            trim_silence: true,
            vad_enabled: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotkeySettings {
    pub primary: String,
    pub mode: ActivationMode,
}

impl Default for HotkeySettings {
    fn default() -> Self {
        Self {
            primary: "Ctrl+Shift+Space".to_string(),
            mode: ActivationMode::Hold,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InjectionSettings {
    pub method: InjectionMethod,
    pub paste_delay_ms: u32,
    pub restore_clipboard: bool,
    /// Appended after every injected transcript.
    pub suffix: String,
}

impl Default for InjectionSettings {
    fn default() -> Self {
        Self {
            method: InjectionMethod::Direct,
            paste_delay_ms: 40,
            restore_clipboard: true,
            suffix: " ".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub model_id: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryPersistence {
    #[default]
    Memory,
    Disk,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    pub persistence_mode: HistoryPersistence,
    pub max_entries: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresetSettings {
    pub enabled_presets: Vec<String>,
}

/// A text substitution applied to transcripts by the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacementRule {
    pub id: String,
    pub pattern: String,
    pub replacement: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub word_boundary: bool,
    #[serde(default)]
    pub case_sensitive: bool,
}

fn default_true() -> bool {
    true
}

/// Object-shaped sections that accept partial updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigSection {
    Audio,
    Hotkey,
    Injection,
    Model,
    History,
    Presets,
}

impl ConfigSection {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "audio" => Some(ConfigSection::Audio),
            "hotkey" => Some(ConfigSection::Hotkey),
            "injection" => Some(ConfigSection::Injection),
            "model" => Some(ConfigSection::Model),
            "history" => Some(ConfigSection::History),
            "presets" => Some(ConfigSection::Presets),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigSection::Audio => "audio",
            ConfigSection::Hotkey => "hotkey",
            ConfigSection::Injection => "injection",
            ConfigSection::Model => "model",
            ConfigSection::History => "history",
            ConfigSection::Presets => "presets",
        }
    }
}

impl fmt::Display for ConfigSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl UserConfig {
    /// Return a copy with `partial` deep-merged into `section`.
    ///
    /// Keys unknown to the section are rejected, and the merged document must
    /// still deserialize. `self` is never modified.
    pub fn merged_with(&self, section: ConfigSection, partial: &Value) -> Result<UserConfig> {
        let patch = partial.as_object().ok_or_else(|| {
            VocalisError::Config(format!("partial update for `{}` must be an object", section))
        })?;

        let mut document = serde_json::to_value(self)?;
        let target = document
            .get_mut(section.as_str())
            .and_then(Value::as_object_mut)
            .ok_or_else(|| VocalisError::Config(format!("section `{}` is missing", section)))?;

        if let Some(unknown) = patch.keys().find(|key| !target.contains_key(*key)) {
            return Err(VocalisError::Config(format!(
                "unknown key `{}` in section `{}`",
                unknown, section
            )));
        }

        for (key, value) in patch {
            merge_json(target.entry(key.clone()).or_insert(Value::Null), value);
        }

        serde_json::from_value(document)
            .map_err(|e| VocalisError::Config(format!("invalid `{}` update: {}", section, e)))
    }

    /// Return a copy with the replacement rule list swapped out.
    pub fn with_replacements(&self, rules: Vec<ReplacementRule>) -> UserConfig {
        UserConfig {
            replacements: rules,
            ..self.clone()
        }
    }

    /// The configured model, or `fallback` when none is set.
    pub fn model_id_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.model
            .model_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(fallback)
    }
}

fn merge_json(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target_map), Value::Object(patch_map)) => {
            for (key, value) in patch_map {
                merge_json(target_map.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}
