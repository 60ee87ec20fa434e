/// Worker lifecycle states
///
/// A worker cycles `Idle -> Fetching -> Parsing -> Dispatching -> Idle` for
/// every target. The controller's stop signal is observed only while the
/// worker is idle, so a fetch in progress is never interrupted.
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerState {
    /// Waiting for the next frontier target
    Idle,

    /// Checking robots rules and fetching the target
    Fetching,

    /// Handing the fetched body to the parser
    Parsing,

    /// Admitting children and invoking the visitor
    Dispatching,

    /// Stop signal observed, running exit hooks
    Stopping,

    /// Worker loop has returned
    Stopped,
}

impl WorkerState {
    /// Returns true if moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: WorkerState) -> bool {
        use WorkerState::*;
        matches!(
            (self, next),
            (Idle, Fetching)
                | (Fetching, Parsing)
                | (Fetching, Dispatching)
                | (Fetching, Idle)
                | (Parsing, Dispatching)
                | (Parsing, Idle)
                | (Dispatching, Idle)
                | (Idle, Stopping)
                | (Stopping, Stopped)
        )
    }

    /// Returns true while the worker is processing a target
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Fetching | Self::Parsing | Self::Dispatching)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Parsing => "parsing",
            Self::Dispatching => "dispatching",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
