//! Raw status token translation.
//!
//! The gateway library reports connection changes as free-form string
//! tokens, and has renamed them more than once across releases. Everything
//! is translated here, at the boundary, so the state machine only ever
//! reasons about four outcomes. Tokens the table does not know are treated
//! as failures: attempting recovery beats silently doing nothing.

use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Status Outcomes
// ----------------------------------------------------------------------------

/// Logical outcome of a raw status notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusOutcome {
    /// The client started (or restarted) a connection attempt.
    Connecting,
    /// The link is established.
    Succeeded,
    /// The link is down.
    Failed,
    /// Token not in the table; handled as a failure.
    Unrecognized,
}

impl StatusOutcome {
    /// Short name for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusOutcome::Connecting => "connecting",
            StatusOutcome::Succeeded => "succeeded",
            StatusOutcome::Failed => "failed",
            StatusOutcome::Unrecognized => "unrecognized",
        }
    }
}

/// Translate a raw gateway status token into a logical outcome.
///
/// Matching is case-insensitive and ignores surrounding whitespace. The
/// alias rows cover every spelling observed across library versions.
pub fn map_raw_status(raw: &str) -> StatusOutcome {
    match raw.trim().to_ascii_lowercase().as_str() {
        // Attempt started
        "connecting" | "reconnecting" | "opening" | "wait_connect" => StatusOutcome::Connecting,
        // Attempt succeeded
        "open" | "opened" | "connected" | "online" => StatusOutcome::Succeeded,
        // Link down
        "close" | "closed" | "closing" | "disconnected" | "offline" | "error"
        | "connection_lost" | "timed_out" => StatusOutcome::Failed,
        _ => StatusOutcome::Unrecognized,
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connecting_aliases() {
        for token in ["connecting", "reconnecting", "opening", "wait_connect"] {
            assert_eq!(map_raw_status(token), StatusOutcome::Connecting, "{token}");
        }
    }

    #[test]
    fn test_succeeded_aliases() {
        for token in ["open", "opened", "connected", "online"] {
            assert_eq!(map_raw_status(token), StatusOutcome::Succeeded, "{token}");
        }
    }

    #[test]
    fn test_failed_aliases() {
        for token in [
            "close",
            "closed",
            "closing",
            "disconnected",
            "offline",
            "error",
            "connection_lost",
            "timed_out",
        ] {
            assert_eq!(map_raw_status(token), StatusOutcome::Failed, "{token}");
        }
    }

    #[test]
    fn test_matching_is_case_and_whitespace_insensitive() {
        assert_eq!(map_raw_status("  OPEN \n"), StatusOutcome::Succeeded);
        assert_eq!(map_raw_status("Connecting"), StatusOutcome::Connecting);
    }

    #[test]
    fn test_unknown_tokens_are_unrecognized() {
        assert_eq!(map_raw_status("syncing"), StatusOutcome::Unrecognized);
        assert_eq!(map_raw_status(""), StatusOutcome::Unrecognized);
    }
}
