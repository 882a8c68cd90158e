//! Folding of heterogeneous error payloads into one [`ErrorEnvelope`].
//!
//! Payloads arrive as a plain string, a flat `{message, recoverable}` object, a
//! structured `{error: {code, message, recoverable}}` object, or one of the
//! legacy nested shapes (`{error: {kind, message}}`, `{app_error: {...}}`).

use serde_json::{Map, Value};
use vocalis_core::types::{ErrorCode, ErrorEnvelope};

const UNKNOWN_ERROR: &str = "Unknown error";

/// Normalize any error payload. Never fails.
pub fn normalize_error(payload: &Value) -> ErrorEnvelope {
    match payload {
        Value::String(message) => envelope(ErrorCode::Internal, message, false),
        Value::Object(map) => normalize_object(map),
        _ => envelope(ErrorCode::Internal, "", false),
    }
}

/// Build an envelope for an error raised by the engine itself.
pub fn local_error(code: ErrorCode, message: impl Into<String>) -> ErrorEnvelope {
    let message = message.into();
    envelope(code, &message, code.default_recoverable())
}

/// Suggestions shown next to an error. Non-recoverable errors get none.
pub fn recovery_actions(code: ErrorCode, recoverable: bool) -> Vec<String> {
    if !recoverable {
        return Vec::new();
    }
    let action = match code {
        ErrorCode::MicPermissionDenied => "Check permissions in system settings",
        ErrorCode::DeviceRemoved | ErrorCode::NoAudioDevice => {
            "Reconnect the device or select another"
        }
        ErrorCode::Network => "Check your connection and retry",
        ErrorCode::DiskFull => "Free up disk space and retry",
        ErrorCode::CacheCorrupt => "Purge the model cache and download again",
        ErrorCode::SidecarSpawn
        | ErrorCode::SidecarIpc
        | ErrorCode::SidecarCrash
        | ErrorCode::SidecarCircuitBreaker => "Restart the recognition worker",
        ErrorCode::ModelNotReady => "Wait for the model to load or download it",
        _ => "Retry the operation",
    };
    vec![action.to_string()]
}

fn normalize_object(map: &Map<String, Value>) -> ErrorEnvelope {
    let nested = map.get("error").and_then(Value::as_object);
    let app_error = map.get("app_error").and_then(Value::as_object);
    let (structured, legacy) = match nested {
        Some(obj) if obj.contains_key("code") => (Some(obj), app_error),
        Some(obj) => (None, Some(obj)),
        None => (None, app_error),
    };

    let message = first_text(&[
        map.get("message"),
        map.get("error"),
        structured.and_then(|obj| obj.get("message")),
        legacy.and_then(|obj| obj.get("message")),
    ]);

    let code = first_text(&[
        structured.and_then(|obj| obj.get("code")),
        legacy.and_then(|obj| obj.get("code")),
        legacy.and_then(|obj| obj.get("kind")),
        map.get("code"),
        map.get("kind"),
    ])
    .map(ErrorCode::from_wire)
    .unwrap_or(ErrorCode::Internal);

    let recoverable = [structured, legacy]
        .into_iter()
        .flatten()
        .find_map(|obj| obj.get("recoverable").and_then(Value::as_bool))
        .or_else(|| map.get("recoverable").and_then(Value::as_bool))
        .unwrap_or(false);

    envelope(code, message.unwrap_or(""), recoverable)
}

/// First candidate that is a non-blank string.
fn first_text<'a>(candidates: &[Option<&'a Value>]) -> Option<&'a str> {
    candidates
        .iter()
        .copied()
        .flatten()
        .filter_map(Value::as_str)
        .find(|text| !text.trim().is_empty())
}

fn envelope(code: ErrorCode, message: &str, recoverable: bool) -> ErrorEnvelope {
    let message = if message.trim().is_empty() {
        UNKNOWN_ERROR.to_string()
    } else {
        message.to_string()
    };
    ErrorEnvelope {
        code,
        message,
        recoverable,
        recovery_actions: recovery_actions(code, recoverable),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_structured_network_error() {
        let env = normalize_error(&json!({
            "error": {"code": "E_NETWORK", "message": "x", "recoverable": true}
        }));
        assert_eq!(env.message, "x");
        assert_eq!(env.code, ErrorCode::Network);
        assert!(env.recoverable);
        assert_eq!(env.recovery_actions, vec!["Check your connection and retry"]);
    }

    #[test]
    fn test_plain_string() {
        let env = normalize_error(&json!("worker exited"));
        assert_eq!(env.message, "worker exited");
        assert_eq!(env.code, ErrorCode::Internal);
        assert!(!env.recoverable);
        assert!(env.recovery_actions.is_empty());
    }

    #[test]
    fn test_flat_object() {
        let env = normalize_error(&json!({"message": "busy", "recoverable": true}));
        assert_eq!(env.message, "busy");
        assert!(env.recoverable);
        assert_eq!(env.recovery_actions, vec!["Retry the operation"]);
    }

    #[test]
    fn test_top_level_message_wins() {
        let env = normalize_error(&json!({
            "message": "outer",
            "error": {"code": "E_DISK_FULL", "message": "inner"}
        }));
        assert_eq!(env.message, "outer");
        assert_eq!(env.code, ErrorCode::DiskFull);
    }

    #[test]
    fn test_top_level_error_string() {
        let env = normalize_error(&json!({"error": "socket closed", "code": "E_SIDECAR_IPC"}));
        assert_eq!(env.message, "socket closed");
        assert_eq!(env.code, ErrorCode::SidecarIpc);
    }

    #[test]
    fn test_legacy_kind_shape() {
        let env = normalize_error(&json!({"error": {"kind": "device_not_found", "message": "gone"}}));
        assert_eq!(env.message, "gone");
        assert_eq!(env.code, ErrorCode::DeviceRemoved);
        assert!(!env.recoverable);
    }

    #[test]
    fn test_legacy_nested_recoverable_flag() {
        let env = normalize_error(&json!({
            "recoverable": false,
            "error": {"kind": "device_not_found", "message": "gone", "recoverable": true}
        }));
        assert!(env.recoverable);
        assert_eq!(env.recovery_actions, vec!["Reconnect the device or select another"]);
    }

    #[test]
    fn test_legacy_app_error_shape() {
        let env = normalize_error(&json!({
            "app_error": {"kind": "permission_denied", "message": "mic blocked"},
            "recoverable": true
        }));
        assert_eq!(env.message, "mic blocked");
        assert_eq!(env.code, ErrorCode::MicPermissionDenied);
        assert_eq!(env.recovery_actions, vec!["Check permissions in system settings"]);
    }

    #[test]
    fn test_structured_recoverable_overrides_top_level() {
        let env = normalize_error(&json!({
            "recoverable": true,
            "error": {"code": "E_NETWORK", "message": "m", "recoverable": false}
        }));
        assert!(!env.recoverable);
        assert!(env.recovery_actions.is_empty());
    }

    #[test]
    fn test_empty_payloads_fall_back() {
        assert_eq!(normalize_error(&json!({})).message, "Unknown error");
        assert_eq!(normalize_error(&json!(null)).message, "Unknown error");
        assert_eq!(normalize_error(&json!({"message": "  "})).message, "Unknown error");
        assert_eq!(normalize_error(&json!("")).message, "Unknown error");
    }

    #[test]
    fn test_unknown_code_is_internal() {
        let env = normalize_error(&json!({"error": {"code": "E_QUANTUM", "message": "?"}}));
        assert_eq!(env.code, ErrorCode::Internal);
    }

    #[test]
    fn test_every_recoverable_code_has_one_action() {
        for code in ErrorCode::ALL {
            assert_eq!(recovery_actions(code, true).len(), 1, "{}", code);
            assert!(recovery_actions(code, false).is_empty());
        }
    }

    #[test]
    fn test_local_error_uses_default_recoverable() {
        let env = local_error(ErrorCode::ModelNotReady, "model still loading");
        assert!(env.recoverable);
        assert_eq!(env.recovery_actions.len(), 1);
        let env = local_error(ErrorCode::Internal, "bug");
        assert!(!env.recoverable);
    }
}
