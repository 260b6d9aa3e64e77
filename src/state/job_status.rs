/// Crawl job status definitions for the distributed crawl
///
/// A job is one "expand a single URL" unit of work handed to a worker.
use std::fmt;

/// Represents the current status of a crawl job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    /// Job record written, worker launch requested but not confirmed
    Pending,

    /// Worker launched successfully, results not yet received
    Created,

    /// Results ingested; the job will not change again
    Complete,
}

impl JobStatus {
    /// Returns true if this is a terminal status (no further transitions)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete)
    }

    /// Returns true if a job in this status may move to `next`
    ///
    /// Jobs only move forward. Results can overtake the launch confirmation,
    /// so `Pending` may skip straight to `Complete`.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Created)
                | (Self::Pending, Self::Complete)
                | (Self::Created, Self::Complete)
        )
    }

    /// Statuses a job must currently hold to move to `self`
    pub fn predecessors(&self) -> &'static [JobStatus] {
        match self {
            Self::Pending => &[],
            Self::Created => &[Self::Pending],
            Self::Complete => &[Self::Pending, Self::Created],
        }
    }

    /// Converts the status to a database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Created => "CREATED",
            Self::Complete => "COMPLETE",
        }
    }

    /// Parses a status from a database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "CREATED" => Some(Self::Created),
            "COMPLETE" => Some(Self::Complete),
            _ => None,
        }
    }

    /// Returns all possible job statuses
    pub fn all_statuses() -> Vec<Self> {
        vec![Self::Pending, Self::Created, Self::Complete]
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
