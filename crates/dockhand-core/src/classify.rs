//! Deploy output line classification.
//!
//! The deployment tool prints free-form progress text. Lines are tagged by
//! substring: anything mentioning `error`/`Error` is an error, lines with
//! `Created`/`Started` report success, the rest is informational. This is a
//! heuristic over human-readable output, not a structured parse.

use crate::protocol::{DeployEvent, EventKind};

/// Classify one output line of the deployment command.
pub fn classify_line(line: &str) -> EventKind {
    if line.contains("error") || line.contains("Error") {
        EventKind::Error
    } else if line.contains("Created") || line.contains("Started") {
        EventKind::Success
    } else {
        EventKind::Info
    }
}

/// Classify `line` and wrap it as a [`DeployEvent`].
pub fn classify_event(line: impl Into<String>) -> DeployEvent {
    let message = line.into();
    DeployEvent::new(classify_line(&message), message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_lines() {
        assert_eq!(classify_line("Error: something failed"), EventKind::Error);
        assert_eq!(classify_line("pull access denied: error"), EventKind::Error);
    }

    #[test]
    fn success_lines() {
        assert_eq!(classify_line("Created container xyz"), EventKind::Success);
        assert_eq!(classify_line(" Container demo-web-1  Started"), EventKind::Success);
    }

    #[test]
    fn info_lines() {
        assert_eq!(classify_line("Pulling layer..."), EventKind::Info);
        assert_eq!(classify_line(""), EventKind::Info);
    }

    #[test]
    fn error_wins_over_success() {
        assert_eq!(
            classify_line("Error response from daemon: Created network failed"),
            EventKind::Error
        );
    }

    #[test]
    fn matching_is_case_sensitive_beyond_listed_forms() {
        assert_eq!(classify_line("ERROR upper case"), EventKind::Info);
        assert_eq!(classify_line("created lower case"), EventKind::Info);
    }

    #[test]
    fn classify_event_keeps_text() {
        let event = classify_event("Started");
        assert_eq!(event.kind, EventKind::Success);
        assert_eq!(event.message, "Started");
    }
}
