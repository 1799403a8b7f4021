use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::session::{AnswerSelection, Lifecycle};

/// What caused the submission dispatch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SubmitTrigger {
    Manual,
    TimeExpired,
    IdentityBlock,
    BehaviorBlock,
}

/// Per-class violation totals included in the submission payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationSummary {
    pub identity: u32,
    pub tab_refocus: u32,
    pub clipboard: u32,
    pub total: u32,
    /// Clipboard use never blocks on its own, but it marks the attempt
    /// for human review.
    pub flagged_for_review: bool,
}

/// Frozen view of the session handed to the submission sink, exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: String,
    pub exam_id: String,
    pub answers: HashMap<String, AnswerSelection>,
    pub marked: Vec<String>,
    pub time_remaining_secs: u32,
    pub trigger: SubmitTrigger,
    pub violations: ViolationSummary,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceipt {
    pub submission_id: String,
}

/// Read-only state snapshot for the presentation layer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub session_id: String,
    pub exam_id: String,
    pub lifecycle: Lifecycle,
    pub started_at: Option<DateTime<Utc>>,
    pub time_remaining_secs: u32,
    pub answered_count: usize,
    pub question_count: usize,
    pub answers: HashMap<String, AnswerSelection>,
    pub marked: Vec<String>,
    pub violations: ViolationSummary,
}
