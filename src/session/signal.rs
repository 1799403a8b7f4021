use crate::events::TimeWarningLevel;
use crate::violations::ViolationKind;

/// Signals raised by the monitors into the session controller's arbiter.
///
/// Monitors never mutate session state; this channel is the only path by
/// which they influence the lifecycle, and the single consumer preserves
/// arrival order.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum MonitorSignal {
    Tick {
        seconds_remaining: u32,
    },
    TimeWarning {
        level: TimeWarningLevel,
        seconds_remaining: u32,
    },
    TimeExpired,
    IdentityWarning {
        kind: ViolationKind,
        similarity_score: Option<f64>,
        countdown_secs: u32,
    },
    IdentityBlock {
        total_violations: u32,
    },
    BehaviorBlock {
        total_violations: u32,
    },
    ManualSubmit,
}
