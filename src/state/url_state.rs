/// URL state definitions for the durable frontier
///
/// Every URL accepted into the frontier is persisted with one of these
/// states. A URL leaves the active states exactly once.
use std::fmt;

/// Represents the current state of a URL in the crawl process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UrlState {
    // ===== Active States =====
    /// Accepted and waiting to be fetched
    Queued,

    /// Handed to a worker, not yet completed
    InProgress,

    // ===== Terminal Success States =====
    /// Fetched, parsed and dispatched to the visitor
    Fetched,

    /// Answered with a redirect; the target was offered to the frontier
    Redirected,

    // ===== Terminal Skip States =====
    /// Disallowed by the host's robots.txt
    RobotsDenied,

    /// Fetched but not visited (binary content while binary is disabled)
    Skipped,

    // ===== Terminal Error States =====
    /// Fetch failed (timeout, connection error, non-2xx, too large)
    Failed,

    /// Fetched but the body could not be parsed
    ParseFailed,
}

impl UrlState {
    /// Returns true if this is a terminal state (never fetched again)
    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }

    /// Returns true if a resumed crawl should queue this URL again
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Queued | Self::InProgress)
    }

    /// Returns true if this represents an error state
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failed | Self::ParseFailed)
    }

    /// Converts the state to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::Fetched => "fetched",
            Self::Redirected => "redirected",
            Self::RobotsDenied => "robots_denied",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
            Self::ParseFailed => "parse_failed",
        }
    }

    /// Parses a state from its database string representation
    ///
    /// Returns None if the string doesn't match any known state.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            "in_progress" => Some(Self::InProgress),
            "fetched" => Some(Self::Fetched),
            "redirected" => Some(Self::Redirected),
            "robots_denied" => Some(Self::RobotsDenied),
            "skipped" => Some(Self::Skipped),
            "failed" => Some(Self::Failed),
            "parse_failed" => Some(Self::ParseFailed),
            _ => None,
        }
    }

    /// All states, in display order
    pub fn all() -> [UrlState; 8] {
        [
            Self::Queued,
            Self::InProgress,
            Self::Fetched,
            Self::Redirected,
            Self::RobotsDenied,
            Self::Skipped,
            Self::Failed,
            Self::ParseFailed,
        ]
    }
}

impl fmt::Display for UrlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}
