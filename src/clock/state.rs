use serde::Serialize;

use crate::events::TimeWarningLevel;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ClockStatus {
    Idle,
    Running,
    Stopped,
    Expired,
}

/// What a single 1 Hz tick produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Tick arrived after the clock stopped; discarded.
    Ignored,
    Running {
        seconds_remaining: u32,
        advisory: Option<TimeWarningLevel>,
    },
    Expired,
}

/// Countdown state. Remaining seconds only ever decrease, and survive a
/// stop so a later start resumes from where the clock halted.
#[derive(Debug, Clone)]
pub struct ClockState {
    pub status: ClockStatus,
    pub remaining_secs: u32,
}

impl Default for ClockState {
    fn default() -> Self {
        Self {
            status: ClockStatus::Idle,
            remaining_secs: 0,
        }
    }
}

impl ClockState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&mut self, duration_secs: u32) {
        self.status = ClockStatus::Running;
        self.remaining_secs = duration_secs;
    }

    /// Apply one 1 Hz decrement. Advisory crossings fire when the
    /// decrement lands exactly on a threshold; remaining seconds are
    /// monotonic across the whole session, so each fires at most once.
    pub fn tick(&mut self, warning_at: u32, critical_at: u32) -> TickOutcome {
        if self.status != ClockStatus::Running {
            return TickOutcome::Ignored;
        }

        self.remaining_secs = self.remaining_secs.saturating_sub(1);

        if self.remaining_secs == 0 {
            self.status = ClockStatus::Expired;
            return TickOutcome::Expired;
        }

        let advisory = if self.remaining_secs == warning_at {
            Some(TimeWarningLevel::Warning)
        } else if self.remaining_secs == critical_at {
            Some(TimeWarningLevel::Critical)
        } else {
            None
        };

        TickOutcome::Running {
            seconds_remaining: self.remaining_secs,
            advisory,
        }
    }

    /// Halt without losing remaining time.
    pub fn stop(&mut self) {
        if self.status == ClockStatus::Running {
            self.status = ClockStatus::Stopped;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_decrement_monotonically() {
        let mut state = ClockState::new();
        state.arm(5);
        let mut previous = state.remaining_secs;
        for _ in 0..4 {
            state.tick(300, 60);
            assert!(state.remaining_secs < previous);
            previous = state.remaining_secs;
        }
    }

    #[test]
    fn expires_exactly_once() {
        let mut state = ClockState::new();
        state.arm(2);
        assert!(matches!(state.tick(300, 60), TickOutcome::Running { .. }));
        assert_eq!(state.tick(300, 60), TickOutcome::Expired);
        // The ticker is already gone by now; a stray tick is discarded
        assert_eq!(state.tick(300, 60), TickOutcome::Ignored);
        assert_eq!(state.status, ClockStatus::Expired);
    }

    #[test]
    fn stop_preserves_remaining_for_resume() {
        let mut state = ClockState::new();
        state.arm(10);
        state.tick(300, 60);
        state.stop();
        assert_eq!(state.status, ClockStatus::Stopped);
        assert_eq!(state.remaining_secs, 9);

        state.arm(state.remaining_secs);
        assert_eq!(
            state.tick(300, 60),
            TickOutcome::Running {
                seconds_remaining: 8,
                advisory: None,
            }
        );
    }

    #[test]
    fn advisory_thresholds_fire_on_crossing() {
        let mut state = ClockState::new();
        state.arm(4);
        assert_eq!(
            state.tick(3, 2),
            TickOutcome::Running {
                seconds_remaining: 3,
                advisory: Some(TimeWarningLevel::Warning),
            }
        );
        assert_eq!(
            state.tick(3, 2),
            TickOutcome::Running {
                seconds_remaining: 2,
                advisory: Some(TimeWarningLevel::Critical),
            }
        );
        assert_eq!(
            state.tick(3, 2),
            TickOutcome::Running {
                seconds_remaining: 1,
                advisory: None,
            }
        );
    }
}
