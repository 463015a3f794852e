/// Outcome state definitions for processed tasks
///
/// Every processed task delivery ends in exactly one of these states.
use serde::Serialize;
use std::fmt;

/// Terminal status of a processed task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    /// Page was fetched and its media (possibly none) recorded
    Succeeded,

    /// Fetch failed and a failure record was written instead
    Failed,
}

impl OutcomeStatus {
    /// Converts the status to a database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    /// Parses a status from a database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "succeeded" => Some(Self::Succeeded),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns all possible statuses
    pub fn all() -> [Self; 2] {
        [Self::Succeeded, Self::Failed]
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// What a worker lane did with one delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Media written and the task acknowledged
    Succeeded { media_count: usize },

    /// Failure record written and the task acknowledged
    Failed { kind: &'static str },

    /// The outcome could not be persisted; the task stays leased and will be
    /// redelivered
    Unacknowledged,
}

impl TaskOutcome {
    /// The persisted status, if the outcome reached storage
    pub fn status(&self) -> Option<OutcomeStatus> {
        match self {
            Self::Succeeded { .. } => Some(OutcomeStatus::Succeeded),
            Self::Failed { .. } => Some(OutcomeStatus::Failed),
            Self::Unacknowledged => None,
        }
    }
}
