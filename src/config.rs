/// Escalation thresholds and sampling intervals for a proctored session.
///
/// Fixed for the lifetime of a session; the engine never mutates these.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Seconds between identity verification cycles
    pub identity_check_interval_secs: u64,

    /// Per-cycle budget for frame capture + feature extraction; a cycle
    /// exceeding it is dropped and retried on the next interval
    pub capture_timeout_secs: u64,

    /// Feature distance above which a single detected face counts as a
    /// mismatch. Distances live on [0, 2]; displayed to users as
    /// `max(0, (1 - distance) * 100)` percent similarity.
    pub identity_distance_cutoff: f64,

    /// Consecutive identity violations (no face / multiple faces /
    /// mismatch, in any mix) before the session is blocked
    pub max_identity_violations: u32,

    /// Grace window after the first violation of a streak, giving the
    /// student time to remediate before an automatic block
    pub grace_period_secs: u32,

    /// Tab-refocus events before auto-submission
    pub max_tab_refocus: u32,

    /// Ticks of the user-visible countdown between a behavior block and
    /// the submission dispatch
    pub auto_submit_countdown_secs: u32,

    /// Advisory remaining-time thresholds, display only
    pub time_warning_secs: u32,
    pub time_critical_secs: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            identity_check_interval_secs: 3,
            capture_timeout_secs: 10,
            identity_distance_cutoff: 0.6,
            max_identity_violations: 3,
            grace_period_secs: 10,
            max_tab_refocus: 3,
            auto_submit_countdown_secs: 3,
            time_warning_secs: 300,
            time_critical_secs: 60,
        }
    }
}
