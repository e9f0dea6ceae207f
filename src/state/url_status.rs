/// Frontier row status definitions
///
/// A row is created `Pending`, moved to `InProgress` by exactly one claim,
/// and finishes in `Done` or `Error` for the attempt. Only a reseed moves a
/// row back to `Pending`.
use std::fmt;

/// Represents the current status of a URL in the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UrlStatus {
    /// Waiting to be claimed by a worker
    Pending,

    /// Claimed by exactly one worker
    InProgress,

    /// Fetch attempt recorded (including failed external status checks)
    Done,

    /// Internal render aborted; an error snapshot was recorded
    Error,
}

impl UrlStatus {
    /// Returns true if no further processing happens for this attempt
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Done => "done",
            Self::Error => "error",
        }
    }

    /// Parses a status from its database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "done" => Some(Self::Done),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Returns all statuses in lifecycle order
    pub fn all() -> [Self; 4] {
        [Self::Pending, Self::InProgress, Self::Done, Self::Error]
    }
}

impl fmt::Display for UrlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
