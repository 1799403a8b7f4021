use serde::Deserialize;

use crate::violations::{ViolationKind, ViolationLog};

/// Browser-side integrity events reported by the embedding shell.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum BehaviorEvent {
    ClipboardCopy,
    ClipboardPaste,
    TabRefocus,
}

/// What an observed event escalated to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BehaviorOutcome {
    /// Watcher disabled: a submission sequence is underway.
    Ignored,
    /// Logged and surfaced, nothing more.
    Advisory { kind: ViolationKind, count: u32 },
    /// Tab-refocus limit reached: auto-submission requested.
    Block { total_violations: u32 },
}

/// Two independent counters with independent thresholds. Clipboard use is
/// always advisory, with no hard cap; tab-refocus escalates to a block at
/// the configured maximum.
pub struct BehaviorWatcher {
    enabled: bool,
    max_tab_refocus: u32,
}

impl BehaviorWatcher {
    pub fn new(max_tab_refocus: u32) -> Self {
        Self {
            enabled: false,
            max_tab_refocus,
        }
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub(crate) fn observe(
        &mut self,
        event: BehaviorEvent,
        log: &mut ViolationLog,
    ) -> BehaviorOutcome {
        if !self.enabled {
            return BehaviorOutcome::Ignored;
        }

        match event {
            BehaviorEvent::ClipboardCopy | BehaviorEvent::ClipboardPaste => {
                let count = log.record(ViolationKind::ClipboardUse, None);
                BehaviorOutcome::Advisory {
                    kind: ViolationKind::ClipboardUse,
                    count,
                }
            }
            BehaviorEvent::TabRefocus => {
                let count = log.record(ViolationKind::TabRefocus, None);
                if count >= self.max_tab_refocus {
                    BehaviorOutcome::Block {
                        total_violations: log.total() as u32,
                    }
                } else {
                    BehaviorOutcome::Advisory {
                        kind: ViolationKind::TabRefocus,
                        count,
                    }
                }
            }
        }
    }
}
