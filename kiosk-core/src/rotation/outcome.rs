use std::fmt;
use std::time::Duration;

use serde::Serialize;

/// Result of one guarded visit, after all retries and restarts inside the
/// resilience manager have played out.
#[derive(Debug, Clone)]
pub enum VisitOutcome {
    Success { load_time: Duration },
    ValidationFailed(String),
    TimedOut(String),
    BrowserCrashed(String),
    UnknownError(String),
}

impl VisitOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, VisitOutcome::Success { .. })
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            VisitOutcome::Success { .. } => None,
            VisitOutcome::ValidationFailed(reason)
            | VisitOutcome::TimedOut(reason)
            | VisitOutcome::BrowserCrashed(reason)
            | VisitOutcome::UnknownError(reason) => Some(reason),
        }
    }

    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            VisitOutcome::Success { .. } => None,
            VisitOutcome::ValidationFailed(_) => Some(FailureKind::Validation),
            VisitOutcome::TimedOut(_) => Some(FailureKind::Timeout),
            VisitOutcome::BrowserCrashed(_) => Some(FailureKind::BrowserCrash),
            VisitOutcome::UnknownError(_) => Some(FailureKind::Unknown),
        }
    }
}

/// Telemetry category for a failed visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Validation,
    Timeout,
    BrowserCrash,
    Unknown,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureKind::Validation => "validation",
            FailureKind::Timeout => "timeout",
            FailureKind::BrowserCrash => "browser_crash",
            FailureKind::Unknown => "unknown",
        };
        write!(f, "{label}")
    }
}
