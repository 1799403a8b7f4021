use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::ViolationSummary;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ViolationKind {
    NoFaceDetected,
    MultipleFacesDetected,
    IdentityMismatch,
    ClipboardUse,
    TabRefocus,
}

/// Escalation class: consecutive counts are tracked per class, not per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationClass {
    Identity,
    Tab,
    Clipboard,
}

impl ViolationKind {
    pub fn class(&self) -> ViolationClass {
        match self {
            ViolationKind::NoFaceDetected
            | ViolationKind::MultipleFacesDetected
            | ViolationKind::IdentityMismatch => ViolationClass::Identity,
            ViolationKind::TabRefocus => ViolationClass::Tab,
            ViolationKind::ClipboardUse => ViolationClass::Clipboard,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationRecord {
    pub kind: ViolationKind,
    pub timestamp: DateTime<Utc>,
    /// Percent similarity (0-100) for identity mismatches, absent otherwise.
    pub similarity_score: Option<f64>,
}

/// Append-only record of integrity events.
///
/// Entries are ordered by append; nothing is ever mutated or removed.
/// The consecutive counters are a cache over the tail of the log:
/// `reset` zeroes a counter without touching history, so the counters
/// stay recomputable from the entries plus the reset points.
#[derive(Debug, Default)]
pub struct ViolationLog {
    entries: Vec<ViolationRecord>,
    consecutive_identity: u32,
    consecutive_tab: u32,
    consecutive_clipboard: u32,
}

impl ViolationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry and return the updated consecutive count for the
    /// kind's escalation class.
    pub fn record(&mut self, kind: ViolationKind, similarity_score: Option<f64>) -> u32 {
        self.entries.push(ViolationRecord {
            kind,
            timestamp: Utc::now(),
            similarity_score,
        });

        let counter = self.counter_mut(kind.class());
        *counter += 1;
        *counter
    }

    /// Zero the consecutive counter for a class; history stays intact.
    /// Called whenever a clean verification cycle occurs.
    pub fn reset(&mut self, class: ViolationClass) {
        *self.counter_mut(class) = 0;
    }

    pub fn consecutive(&self, class: ViolationClass) -> u32 {
        match class {
            ViolationClass::Identity => self.consecutive_identity,
            ViolationClass::Tab => self.consecutive_tab,
            ViolationClass::Clipboard => self.consecutive_clipboard,
        }
    }

    fn counter_mut(&mut self, class: ViolationClass) -> &mut u32 {
        match class {
            ViolationClass::Identity => &mut self.consecutive_identity,
            ViolationClass::Tab => &mut self.consecutive_tab,
            ViolationClass::Clipboard => &mut self.consecutive_clipboard,
        }
    }

    pub fn entries(&self) -> &[ViolationRecord] {
        &self.entries
    }

    pub fn total(&self) -> usize {
        self.entries.len()
    }

    /// Lifetime total for a class, derived from the full log.
    pub fn total_for(&self, class: ViolationClass) -> u32 {
        self.entries
            .iter()
            .filter(|record| record.kind.class() == class)
            .count() as u32
    }

    pub fn summary(&self) -> ViolationSummary {
        let clipboard = self.total_for(ViolationClass::Clipboard);
        ViolationSummary {
            identity: self.total_for(ViolationClass::Identity),
            tab_refocus: self.total_for(ViolationClass::Tab),
            clipboard,
            total: self.entries.len() as u32,
            flagged_for_review: clipboard > 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_identity_kinds_share_one_streak() {
        let mut log = ViolationLog::new();
        assert_eq!(log.record(ViolationKind::NoFaceDetected, None), 1);
        assert_eq!(log.record(ViolationKind::IdentityMismatch, Some(34.0)), 2);
        assert_eq!(log.record(ViolationKind::MultipleFacesDetected, None), 3);
        assert_eq!(log.consecutive(ViolationClass::Identity), 3);
    }

    #[test]
    fn classes_count_independently() {
        let mut log = ViolationLog::new();
        log.record(ViolationKind::IdentityMismatch, Some(10.0));
        log.record(ViolationKind::TabRefocus, None);
        log.record(ViolationKind::ClipboardUse, None);
        log.record(ViolationKind::TabRefocus, None);

        assert_eq!(log.consecutive(ViolationClass::Identity), 1);
        assert_eq!(log.consecutive(ViolationClass::Tab), 2);
        assert_eq!(log.consecutive(ViolationClass::Clipboard), 1);
    }

    #[test]
    fn reset_zeroes_counter_but_keeps_history() {
        let mut log = ViolationLog::new();
        log.record(ViolationKind::NoFaceDetected, None);
        log.record(ViolationKind::NoFaceDetected, None);
        log.reset(ViolationClass::Identity);

        assert_eq!(log.consecutive(ViolationClass::Identity), 0);
        assert_eq!(log.total(), 2);
        assert_eq!(log.total_for(ViolationClass::Identity), 2);

        // The next violation starts a fresh streak
        assert_eq!(log.record(ViolationKind::IdentityMismatch, Some(5.0)), 1);
    }

    #[test]
    fn entries_keep_append_order() {
        let mut log = ViolationLog::new();
        log.record(ViolationKind::TabRefocus, None);
        log.record(ViolationKind::ClipboardUse, None);
        log.record(ViolationKind::TabRefocus, None);

        let kinds: Vec<_> = log.entries().iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ViolationKind::TabRefocus,
                ViolationKind::ClipboardUse,
                ViolationKind::TabRefocus,
            ]
        );
    }

    #[test]
    fn clipboard_use_flags_review() {
        let mut log = ViolationLog::new();
        assert!(!log.summary().flagged_for_review);
        log.record(ViolationKind::ClipboardUse, None);
        let summary = log.summary();
        assert!(summary.flagged_for_review);
        assert_eq!(summary.clipboard, 1);
        assert_eq!(summary.total, 1);
    }
}
