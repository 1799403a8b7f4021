use serde::Serialize;

use crate::models::Lifecycle;
use crate::violations::ViolationKind;

/// Advisory remaining-time levels, consumed only for display.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TimeWarningLevel {
    Warning,
    Critical,
}

/// Which escalation path forced the session closed. The two differ only
/// in the message surfaced to the user, not in arbitration.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum BlockKind {
    Identity,
    Behavior,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WarningKind {
    /// An identity violation with its live remediation countdown.
    Identity {
        kind: ViolationKind,
        similarity_score: Option<f64>,
    },
    /// An advisory behavior violation; carries no countdown.
    Behavior { kind: ViolationKind, count: u32 },
    /// The informational countdown preceding an auto-submission.
    AutoSubmit,
}

/// Everything the engine surfaces to the embedding shell. Delivered over
/// the receiver handed out at construction; the engine never renders.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum EngineEvent {
    Tick {
        seconds_remaining: u32,
    },
    TimeWarning {
        level: TimeWarningLevel,
        seconds_remaining: u32,
    },
    Warning {
        kind: WarningKind,
        countdown_secs: u32,
    },
    Blocked {
        kind: BlockKind,
        total_violations: u32,
    },
    LifecycleChanged {
        lifecycle: Lifecycle,
    },
    SubmissionResult {
        success: bool,
        detail: String,
    },
}
