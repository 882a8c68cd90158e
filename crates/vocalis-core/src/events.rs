use std::fmt;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{Result, VocalisError};
use crate::types::{InjectionResult, ModelProgress, TranscriptEntry};

/// Inbound event topics from the platform layer and the recognition worker.
///
/// Each topic has one canonical name plus the names older builds emitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Topic {
    StateChanged,
    RecordingStatus,
    ModelStatus,
    AudioLevel,
    TranscriptComplete,
    TranscriptError,
    AppError,
    SidecarStatus,
}

impl Topic {
    pub const ALL: [Topic; 8] = [
        Topic::StateChanged,
        Topic::RecordingStatus,
        Topic::ModelStatus,
        Topic::AudioLevel,
        Topic::TranscriptComplete,
        Topic::TranscriptError,
        Topic::AppError,
        Topic::SidecarStatus,
    ];

    pub fn canonical_name(&self) -> &'static str {
        match self {
            Topic::StateChanged => "state-changed",
            Topic::RecordingStatus => "recording-status",
            Topic::ModelStatus => "model-status",
            Topic::AudioLevel => "audio-level",
            Topic::TranscriptComplete => "transcript-complete",
            Topic::TranscriptError => "transcript-error",
            Topic::AppError => "app-error",
            Topic::SidecarStatus => "sidecar-status",
        }
    }

    /// Deprecated names that must reach the same handler.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Topic::StateChanged => &["status:changed", "state_changed"],
            Topic::RecordingStatus => &["recording:status", "recording_status"],
            Topic::ModelStatus => &["model:status", "model_status"],
            Topic::AudioLevel => &["audio:level", "audio_level"],
            Topic::TranscriptComplete => &["transcription:complete", "transcription_complete"],
            Topic::TranscriptError => &["transcription:error", "transcription_error"],
            Topic::AppError => &["app:error", "app_error"],
            Topic::SidecarStatus => &["sidecar:status", "sidecar_status"],
        }
    }

    /// Resolve a canonical name or alias.
    pub fn from_name(name: &str) -> Option<Topic> {
        let name = name.trim();
        Topic::ALL
            .into_iter()
            .find(|topic| topic.canonical_name() == name || topic.aliases().contains(&name))
    }

    /// Topics whose every event matters. All others are last-value-wins.
    pub fn is_append_only(&self) -> bool {
        matches!(self, Topic::TranscriptComplete)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}

/// Return the first candidate that is present and not blank.
pub fn first_non_empty<'a>(candidates: &[Option<&'a str>]) -> Option<&'a str> {
    candidates
        .iter()
        .flatten()
        .copied()
        .find(|value| !value.trim().is_empty())
}

// =============================================================================
// Payloads
// =============================================================================

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct StateChangedPayload {
    pub state: String,
    #[serde(default)]
    pub detail: Option<String>,
    /// Deprecated spelling of `detail`.
    #[serde(default)]
    pub error_detail: Option<String>,
}

impl StateChangedPayload {
    pub fn error_detail(&self) -> Option<&str> {
        first_non_empty(&[self.detail.as_deref(), self.error_detail.as_deref()])
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct RecordingStatusPayload {
    #[serde(alias = "state")]
    pub phase: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub seq: Option<u64>,
    #[serde(default)]
    pub detail: Option<String>,
    /// Deprecated spelling of `detail`.
    #[serde(default)]
    pub error_detail: Option<String>,
}

impl RecordingStatusPayload {
    pub fn error_detail(&self) -> Option<&str> {
        first_non_empty(&[self.detail.as_deref(), self.error_detail.as_deref()])
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
struct ProgressWire {
    current: u64,
    #[serde(default)]
    total: Option<u64>,
    #[serde(default)]
    unit: Option<String>,
    /// Older workers described the unit as a stage name.
    #[serde(default)]
    stage: Option<String>,
}

impl From<ProgressWire> for ModelProgress {
    fn from(wire: ProgressWire) -> Self {
        ModelProgress {
            current: wire.current,
            total: wire.total,
            unit: wire
                .unit
                .or(wire.stage)
                .unwrap_or_else(|| "processing".to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
struct CurrentModelStatus {
    #[serde(default)]
    model_id: Option<String>,
    status: String,
    #[serde(default)]
    revision: Option<String>,
    #[serde(default)]
    cache_path: Option<String>,
    #[serde(default)]
    progress: Option<ProgressWire>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    seq: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
struct LegacyModelObject {
    #[serde(default)]
    model_id: Option<String>,
    status: String,
    #[serde(default)]
    revision: Option<String>,
    #[serde(default)]
    cache_path: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
enum LegacyModelField {
    Object(LegacyModelObject),
    State(String),
}

/// Model state nested inside a worker status-changed notification.
#[derive(Clone, Debug, PartialEq, Deserialize)]
struct NestedModelStatus {
    model: LegacyModelField,
    #[serde(default)]
    progress: Option<ProgressWire>,
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    seq: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
enum ModelStatusWire {
    Current(CurrentModelStatus),
    Nested(NestedModelStatus),
}

/// One model-status notification in canonical form.
///
/// `status` keeps the raw wire string; lifecycle folding belongs to the tracker.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelStatusUpdate {
    pub model_id: Option<String>,
    pub status: String,
    pub revision: Option<String>,
    pub cache_path: Option<String>,
    pub progress: Option<ModelProgress>,
    pub error: Option<String>,
    pub seq: Option<u64>,
}

impl From<ModelStatusWire> for ModelStatusUpdate {
    fn from(wire: ModelStatusWire) -> Self {
        match wire {
            ModelStatusWire::Current(current) => ModelStatusUpdate {
                model_id: current.model_id,
                status: current.status,
                revision: current.revision,
                cache_path: current.cache_path,
                progress: current.progress.map(ModelProgress::from),
                error: current.error,
                seq: current.seq,
            },
            ModelStatusWire::Nested(nested) => {
                let progress = nested.progress.map(ModelProgress::from);
                match nested.model {
                    LegacyModelField::Object(model) => ModelStatusUpdate {
                        model_id: model.model_id,
                        status: model.status,
                        revision: model.revision,
                        cache_path: model.cache_path,
                        progress,
                        error: nested.detail,
                        seq: nested.seq,
                    },
                    LegacyModelField::State(status) => ModelStatusUpdate {
                        status,
                        progress,
                        error: nested.detail,
                        seq: nested.seq,
                        ..ModelStatusUpdate::default()
                    },
                }
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct AudioLevelPayload {
    pub rms: f64,
    pub peak: f64,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
struct TranscriptEntryWire {
    #[serde(default)]
    id: Option<Uuid>,
    #[serde(default)]
    text: String,
    #[serde(default)]
    raw_text: Option<String>,
    #[serde(default)]
    final_text: Option<String>,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
    #[serde(default, alias = "duration_ms")]
    audio_duration_ms: u64,
    #[serde(default, alias = "processing_duration_ms")]
    transcription_duration_ms: u64,
    #[serde(default)]
    injection_result: Option<InjectionResult>,
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
struct WrappedTranscript {
    entry: TranscriptEntryWire,
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
enum TranscriptCompleteWire {
    Wrapped(WrappedTranscript),
    Flat(TranscriptEntryWire),
}

#[derive(Clone, Debug, PartialEq)]
pub struct TranscriptCompletePayload {
    pub entry: TranscriptEntry,
    pub session_id: Option<String>,
}

impl From<TranscriptCompleteWire> for TranscriptCompletePayload {
    fn from(wire: TranscriptCompleteWire) -> Self {
        let (entry, outer_session) = match wire {
            TranscriptCompleteWire::Wrapped(wrapped) => (wrapped.entry, wrapped.session_id),
            TranscriptCompleteWire::Flat(entry) => (entry, None),
        };
        let session_id = outer_session.or(entry.session_id);
        TranscriptCompletePayload {
            entry: TranscriptEntry {
                id: entry.id.unwrap_or_else(Uuid::new_v4),
                text: entry.text,
                raw_text: entry.raw_text,
                final_text: entry.final_text,
                timestamp: entry.timestamp.unwrap_or_else(Utc::now),
                audio_duration_ms: entry.audio_duration_ms,
                transcription_duration_ms: entry.transcription_duration_ms,
                injection_result: entry.injection_result.unwrap_or(InjectionResult::Injected),
            },
            session_id,
        }
    }
}

/// A failed transcription. `error` keeps whatever shape the worker sent.
#[derive(Clone, Debug, PartialEq)]
pub struct TranscriptErrorPayload {
    pub session_id: Option<String>,
    pub error: Value,
}

impl TranscriptErrorPayload {
    fn from_value(mut payload: Value) -> Self {
        let session_id = payload
            .get("session_id")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned);
        let error = match payload.as_object_mut() {
            Some(map) if map.contains_key("error") => map.remove("error").unwrap_or(Value::Null),
            Some(map) => {
                // Older workers sent `{session_id, kind, message}` at the top level.
                map.remove("session_id");
                payload
            }
            None => payload,
        };
        TranscriptErrorPayload { session_id, error }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct SidecarStatusPayload {
    pub state: String,
    #[serde(default)]
    pub restart_count: u32,
    #[serde(default)]
    pub message: Option<String>,
}

// =============================================================================
// Events
// =============================================================================

/// Every inbound event the reconciler understands, already normalized per topic.
#[derive(Clone, Debug, PartialEq)]
pub enum InboundEvent {
    StateChanged(StateChangedPayload),
    RecordingStatus(RecordingStatusPayload),
    ModelStatus(ModelStatusUpdate),
    AudioLevel(AudioLevelPayload),
    TranscriptComplete(TranscriptCompletePayload),
    TranscriptError(TranscriptErrorPayload),
    AppError(Value),
    SidecarStatus(SidecarStatusPayload),
}

impl InboundEvent {
    /// Decode a raw `(topic, payload)` pair as delivered by a collaborator.
    pub fn decode(topic_name: &str, payload: Value) -> Result<Self> {
        let topic = Topic::from_name(topic_name)
            .ok_or_else(|| VocalisError::UnknownTopic(topic_name.to_string()))?;
        Self::decode_topic(topic, payload)
    }

    pub fn decode_topic(topic: Topic, payload: Value) -> Result<Self> {
        let malformed = |e: serde_json::Error| VocalisError::Payload {
            topic: topic.canonical_name().to_string(),
            reason: e.to_string(),
        };

        let event = match topic {
            Topic::StateChanged => {
                InboundEvent::StateChanged(serde_json::from_value(payload).map_err(malformed)?)
            }
            Topic::RecordingStatus => {
                InboundEvent::RecordingStatus(serde_json::from_value(payload).map_err(malformed)?)
            }
            Topic::ModelStatus => {
                let wire: ModelStatusWire = serde_json::from_value(payload).map_err(malformed)?;
                InboundEvent::ModelStatus(wire.into())
            }
            Topic::AudioLevel => {
                InboundEvent::AudioLevel(serde_json::from_value(payload).map_err(malformed)?)
            }
            Topic::TranscriptComplete => {
                let wire: TranscriptCompleteWire =
                    serde_json::from_value(payload).map_err(malformed)?;
                InboundEvent::TranscriptComplete(wire.into())
            }
            Topic::TranscriptError => {
                InboundEvent::TranscriptError(TranscriptErrorPayload::from_value(payload))
            }
            Topic::AppError => InboundEvent::AppError(payload),
            Topic::SidecarStatus => {
                InboundEvent::SidecarStatus(serde_json::from_value(payload).map_err(malformed)?)
            }
        };
        Ok(event)
    }

    pub fn topic(&self) -> Topic {
        match self {
            InboundEvent::StateChanged(_) => Topic::StateChanged,
            InboundEvent::RecordingStatus(_) => Topic::RecordingStatus,
            InboundEvent::ModelStatus(_) => Topic::ModelStatus,
            InboundEvent::AudioLevel(_) => Topic::AudioLevel,
            InboundEvent::TranscriptComplete(_) => Topic::TranscriptComplete,
            InboundEvent::TranscriptError(_) => Topic::TranscriptError,
            InboundEvent::AppError(_) => Topic::AppError,
            InboundEvent::SidecarStatus(_) => Topic::SidecarStatus,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_topic_canonical_and_aliases_resolve() {
        for topic in Topic::ALL {
            assert_eq!(Topic::from_name(topic.canonical_name()), Some(topic));
            for alias in topic.aliases() {
                assert_eq!(Topic::from_name(alias), Some(topic), "alias {}", alias);
            }
        }
        assert_eq!(Topic::from_name("overlay:shown"), None);
    }

    #[test]
    fn test_only_transcripts_are_append_only() {
        let append_only: Vec<Topic> = Topic::ALL
            .into_iter()
            .filter(Topic::is_append_only)
            .collect();
        assert_eq!(append_only, vec![Topic::TranscriptComplete]);
    }

    #[test]
    fn test_first_non_empty() {
        assert_eq!(first_non_empty(&[None, Some("  "), Some("b")]), Some("b"));
        assert_eq!(first_non_empty(&[Some("a"), Some("b")]), Some("a"));
        assert_eq!(first_non_empty(&[None, Some("")]), None);
    }

    #[test]
    fn test_state_changed_detail_alias() {
        let event = InboundEvent::decode(
            "status:changed",
            json!({"state": "error", "detail": "", "error_detail": "mic unplugged"}),
        )
        .unwrap();
        match event {
            InboundEvent::StateChanged(payload) => {
                assert_eq!(payload.error_detail(), Some("mic unplugged"));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_recording_status_accepts_state_alias() {
        let event =
            InboundEvent::decode("recording-status", json!({"state": "recording", "seq": 3}))
                .unwrap();
        match event {
            InboundEvent::RecordingStatus(payload) => {
                assert_eq!(payload.phase, "recording");
                assert_eq!(payload.seq, Some(3));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_model_status_current_shape() {
        let event = InboundEvent::decode(
            "model-status",
            json!({
                "model_id": "base",
                "status": "downloading",
                "progress": {"current": 10, "total": 100, "unit": "bytes"},
                "seq": 7
            }),
        )
        .unwrap();
        let InboundEvent::ModelStatus(update) = event else {
            panic!("expected model status");
        };
        assert_eq!(update.model_id.as_deref(), Some("base"));
        assert_eq!(update.status, "downloading");
        assert_eq!(update.seq, Some(7));
        let progress = update.progress.unwrap();
        assert_eq!(progress.current, 10);
        assert_eq!(progress.total, Some(100));
        assert_eq!(progress.unit, "bytes");
    }

    #[test]
    fn test_model_status_nested_object_shape() {
        let event = InboundEvent::decode(
            "model:status",
            json!({
                "model": {"model_id": "base", "status": "ready", "revision": "abc"},
                "progress": {"current": 5, "stage": "verify"}
            }),
        )
        .unwrap();
        let InboundEvent::ModelStatus(update) = event else {
            panic!("expected model status");
        };
        assert_eq!(update.model_id.as_deref(), Some("base"));
        assert_eq!(update.status, "ready");
        assert_eq!(update.revision.as_deref(), Some("abc"));
        assert_eq!(update.progress.unwrap().unit, "verify");
        assert_eq!(update.seq, None);
    }

    #[test]
    fn test_model_status_nested_string_shape() {
        let event = InboundEvent::decode(
            "model_status",
            json!({"model": "error", "detail": "checksum mismatch"}),
        )
        .unwrap();
        let InboundEvent::ModelStatus(update) = event else {
            panic!("expected model status");
        };
        assert_eq!(update.model_id, None);
        assert_eq!(update.status, "error");
        assert_eq!(update.error.as_deref(), Some("checksum mismatch"));
    }

    #[test]
    fn test_model_status_malformed_is_payload_error() {
        let err = InboundEvent::decode("model-status", json!({"progress": 5})).unwrap_err();
        assert!(matches!(err, VocalisError::Payload { .. }));
    }

    #[test]
    fn test_unknown_topic_is_rejected() {
        let err = InboundEvent::decode("tray:update", json!({})).unwrap_err();
        assert!(matches!(err, VocalisError::UnknownTopic(_)));
    }

    #[test]
    fn test_transcript_complete_wrapped_and_flat() {
        let wrapped = InboundEvent::decode(
            "transcript-complete",
            json!({"entry": {"text": "hi", "final_text": "Hi."}, "session_id": "s1"}),
        )
        .unwrap();
        let InboundEvent::TranscriptComplete(payload) = wrapped else {
            panic!("expected transcript");
        };
        assert_eq!(payload.entry.text, "hi");
        assert_eq!(payload.entry.final_text.as_deref(), Some("Hi."));
        assert_eq!(payload.session_id.as_deref(), Some("s1"));
        assert_eq!(payload.entry.injection_result, InjectionResult::Injected);

        let flat = InboundEvent::decode(
            "transcription:complete",
            json!({"text": "legacy", "duration_ms": 1200, "session_id": "s2"}),
        )
        .unwrap();
        let InboundEvent::TranscriptComplete(payload) = flat else {
            panic!("expected transcript");
        };
        assert_eq!(payload.entry.text, "legacy");
        assert_eq!(payload.entry.audio_duration_ms, 1200);
        assert_eq!(payload.session_id.as_deref(), Some("s2"));
    }

    #[test]
    fn test_transcript_error_shapes() {
        let current = InboundEvent::decode(
            "transcript-error",
            json!({"session_id": "s1", "error": {"code": "E_TRANSCRIPTION_TIMEOUT", "message": "slow"}}),
        )
        .unwrap();
        let InboundEvent::TranscriptError(payload) = current else {
            panic!("expected transcript error");
        };
        assert_eq!(payload.session_id.as_deref(), Some("s1"));
        assert_eq!(payload.error["code"], "E_TRANSCRIPTION_TIMEOUT");

        let legacy = InboundEvent::decode(
            "transcription:error",
            json!({"session_id": "s2", "kind": "transcription", "message": "boom"}),
        )
        .unwrap();
        let InboundEvent::TranscriptError(payload) = legacy else {
            panic!("expected transcript error");
        };
        assert_eq!(payload.session_id.as_deref(), Some("s2"));
        assert_eq!(payload.error["message"], "boom");
        assert!(payload.error.get("session_id").is_none());
    }

    #[test]
    fn test_sidecar_status_defaults() {
        let event = InboundEvent::decode("sidecar-status", json!({"state": "ready"})).unwrap();
        assert_eq!(
            event,
            InboundEvent::SidecarStatus(SidecarStatusPayload {
                state: "ready".into(),
                restart_count: 0,
                message: None,
            })
        );
        assert_eq!(event.topic(), Topic::SidecarStatus);
    }
}
