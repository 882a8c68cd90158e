//! Home-directory redaction and size bounding for diagnostics text.
//!
//! Reports leave the machine, so every recognizable per-user path prefix is
//! replaced before anything is cut to size.

use std::sync::LazyLock;

use regex::Regex;

/// Marker appended to a report that was cut to fit.
pub const TRUNCATION_MARKER: &str = "\n... [truncated]";

/// Per-OS home prefixes. The user segment stops at the next separator.
static HOME_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)[a-z]:[\\/]+users[\\/]+[^\\/\s]+",
        r"/Users/[^/\s]+",
        r"/home/[^/\s]+",
        r"/root\b",
    ]
    .into_iter()
    .map(|pattern| Regex::new(pattern).expect("Invalid home path regex"))
    .collect()
});

/// Replace every home-directory prefix in `text` with `placeholder`.
///
/// Returns the redacted text and the number of replacements made.
pub fn redact_home_paths(text: &str, placeholder: &str) -> (String, usize) {
    let mut redacted = text.to_string();
    let mut count = 0usize;

    for pattern in HOME_PATTERNS.iter() {
        let matches = pattern.find_iter(&redacted).count();
        if matches > 0 {
            redacted = pattern
                .replace_all(&redacted, regex::NoExpand(placeholder))
                .into_owned();
            count += matches;
        }
    }

    (redacted, count)
}

/// Cut `text` to at most `max_chars` characters, appending [`TRUNCATION_MARKER`].
///
/// Counts characters, not bytes, so multi-byte text is never split mid-character.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        None => text.to_string(),
        Some((cut, _)) => {
            let mut truncated = String::with_capacity(cut + TRUNCATION_MARKER.len());
            truncated.push_str(&text[..cut]);
            truncated.push_str(TRUNCATION_MARKER);
            truncated
        }
    }
}

/// Redact, then bound. The order matters: a path cut in half cannot be matched.
pub fn sanitize_report(text: &str, placeholder: &str, max_chars: usize) -> String {
    let (redacted, _) = redact_home_paths(text, placeholder);
    truncate_chars(&redacted, max_chars)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_macos_home() {
        let (text, count) = redact_home_paths("log at /Users/alice/Library/Logs/app.log", "<HOME>");
        assert_eq!(text, "log at <HOME>/Library/Logs/app.log");
        assert_eq!(count, 1);
    }

    #[test]
    fn test_redact_linux_home() {
        let (text, count) =
            redact_home_paths("cache=/home/bob/.cache/models, /home/bob/x", "<HOME>");
        assert_eq!(text, "cache=<HOME>/.cache/models, <HOME>/x");
        assert_eq!(count, 2);
    }

    #[test]
    fn test_redact_windows_home_both_separators() {
        let (text, count) = redact_home_paths(
            r"C:\Users\Carol\AppData\Local and c:/users/carol/models",
            "<HOME>",
        );
        assert_eq!(text, r"<HOME>\AppData\Local and <HOME>/models");
        assert_eq!(count, 2);
    }

    #[test]
    fn test_redact_root_home() {
        let (text, count) = redact_home_paths("/root/.config/vocalis", "<HOME>");
        assert_eq!(text, "<HOME>/.config/vocalis");
        assert_eq!(count, 1);
    }

    #[test]
    fn test_redact_leaves_other_paths() {
        let (text, count) = redact_home_paths("/usr/share/models and /rooted/path", "<HOME>");
        assert_eq!(text, "/usr/share/models and /rooted/path");
        assert_eq!(count, 0);
    }

    #[test]
    fn test_placeholder_is_literal() {
        let (text, _) = redact_home_paths("/home/dan/x", "$HOME");
        assert_eq!(text, "$HOME/x");
    }

    #[test]
    fn test_truncate_short_text_untouched() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("exact", 5), "exact");
    }

    #[test]
    fn test_truncate_appends_marker() {
        let out = truncate_chars("abcdefghij", 4);
        assert_eq!(out, format!("abcd{}", TRUNCATION_MARKER));
    }

    #[test]
    fn test_truncate_multibyte() {
        let out = truncate_chars("ééééé", 2);
        assert!(out.starts_with("éé"));
        assert!(out.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn test_sanitize_redacts_before_cut() {
        // Cut lands inside the username; redaction must already have happened.
        let text = "path: /Users/someverylongname/file";
        let out = sanitize_report(text, "<HOME>", 14);
        assert!(!out.contains("someverylong"));
        assert!(!out.contains("/Users/s"));
        assert!(out.ends_with(TRUNCATION_MARKER));
    }
}
