use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::exam::{ExamData, Question, QuestionKind};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Lifecycle {
    NotStarted,
    VerifyingIdentity,
    InProgress,
    Blocked,
    TimeExpired,
    Submitting,
    Submitted,
    Failed,
}

impl Lifecycle {
    /// Terminal states: the session is over and no command changes it.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Lifecycle::Submitted | Lifecycle::Failed)
    }
}

/// A stored answer, shaped by the question's kind at load time.
///
/// Single-choice selections replace; multi-choice selections toggle
/// membership. The variant is never inferred from the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AnswerSelection {
    Single { index: usize },
    Multiple { indices: BTreeSet<usize> },
}

/// Mutable state of one exam attempt.
///
/// Written only by the session controller; monitors raise signals and
/// never touch this directly.
#[derive(Debug, Clone)]
pub struct ExamSession {
    pub session_id: String,
    pub exam_id: String,
    pub questions: Vec<Question>,
    pub answers: HashMap<String, AnswerSelection>,
    pub marked: BTreeSet<String>,
    pub time_remaining_secs: u32,
    pub duration_secs: u32,
    pub lifecycle: Lifecycle,
    /// One-way latch per submission attempt; while set, every further
    /// trigger that would re-enter submission is discarded.
    pub submission_guard: bool,
    pub started_at: Option<DateTime<Utc>>,
}

impl ExamSession {
    pub fn new(exam: ExamData) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            exam_id: exam.exam_id,
            questions: exam.questions,
            answers: HashMap::new(),
            marked: BTreeSet::new(),
            time_remaining_secs: exam.duration_secs,
            duration_secs: exam.duration_secs,
            lifecycle: Lifecycle::NotStarted,
            submission_guard: false,
            started_at: None,
        }
    }

    pub fn question(&self, question_id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == question_id)
    }

    /// Apply a selection. Returns false when rejected: lifecycle has left
    /// `InProgress`, the question is unknown, or the index is out of range.
    pub fn select_answer(&mut self, question_id: &str, answer_index: usize) -> bool {
        if self.lifecycle != Lifecycle::InProgress {
            return false;
        }

        let Some(question) = self.question(question_id) else {
            return false;
        };
        if answer_index >= question.options.len() {
            return false;
        }

        match question.kind {
            QuestionKind::SingleChoice => {
                self.answers.insert(
                    question_id.to_string(),
                    AnswerSelection::Single {
                        index: answer_index,
                    },
                );
            }
            QuestionKind::MultiChoice => {
                let entry = self
                    .answers
                    .entry(question_id.to_string())
                    .or_insert_with(|| AnswerSelection::Multiple {
                        indices: BTreeSet::new(),
                    });
                if let AnswerSelection::Multiple { indices } = entry {
                    if !indices.insert(answer_index) {
                        indices.remove(&answer_index);
                    }
                    if indices.is_empty() {
                        self.answers.remove(question_id);
                    }
                }
            }
        }

        true
    }

    /// Toggle the review mark, independent of answer state. Rejected
    /// outside `InProgress` or for unknown questions.
    pub fn toggle_mark(&mut self, question_id: &str) -> bool {
        if self.lifecycle != Lifecycle::InProgress {
            return false;
        }
        if self.question(question_id).is_none() {
            return false;
        }

        if !self.marked.insert(question_id.to_string()) {
            self.marked.remove(question_id);
        }
        true
    }

    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::exam::AnswerOption;

    fn exam() -> ExamData {
        let options = |n: usize| {
            (0..n)
                .map(|i| AnswerOption {
                    text: format!("option {i}"),
                    correct: i == 0,
                })
                .collect()
        };
        ExamData {
            exam_id: "exam-1".into(),
            title: "Sample".into(),
            questions: vec![
                Question {
                    id: "q1".into(),
                    kind: QuestionKind::SingleChoice,
                    prompt: "pick one".into(),
                    options: options(4),
                },
                Question {
                    id: "q2".into(),
                    kind: QuestionKind::MultiChoice,
                    prompt: "pick many".into(),
                    options: options(4),
                },
            ],
            duration_secs: 300,
            metadata: serde_json::Value::Null,
        }
    }

    fn in_progress_session() -> ExamSession {
        let mut session = ExamSession::new(exam());
        session.lifecycle = Lifecycle::InProgress;
        session
    }

    #[test]
    fn single_choice_replaces() {
        let mut session = in_progress_session();
        assert!(session.select_answer("q1", 1));
        assert!(session.select_answer("q1", 2));
        assert_eq!(
            session.answers.get("q1"),
            Some(&AnswerSelection::Single { index: 2 })
        );
    }

    #[test]
    fn single_choice_reselect_keeps_one_selection() {
        let mut session = in_progress_session();
        assert!(session.select_answer("q1", 1));
        assert!(session.select_answer("q1", 1));
        assert_eq!(
            session.answers.get("q1"),
            Some(&AnswerSelection::Single { index: 1 })
        );
        assert_eq!(session.answered_count(), 1);
    }

    #[test]
    fn multi_choice_toggles_membership() {
        let mut session = in_progress_session();
        session.select_answer("q2", 0);
        session.select_answer("q2", 3);
        assert_eq!(
            session.answers.get("q2"),
            Some(&AnswerSelection::Multiple {
                indices: [0, 3].into_iter().collect()
            })
        );

        // Toggling both off clears the stored answer entirely
        session.select_answer("q2", 0);
        session.select_answer("q2", 3);
        assert!(session.answers.get("q2").is_none());
    }

    #[test]
    fn mark_twice_restores_original_state() {
        let mut session = in_progress_session();
        assert!(session.toggle_mark("q1"));
        assert!(session.marked.contains("q1"));
        assert!(session.toggle_mark("q1"));
        assert!(!session.marked.contains("q1"));
    }

    #[test]
    fn mutations_rejected_outside_in_progress() {
        let mut session = in_progress_session();
        session.select_answer("q1", 1);
        session.lifecycle = Lifecycle::Submitting;

        assert!(!session.select_answer("q1", 2));
        assert!(!session.toggle_mark("q1"));
        assert_eq!(
            session.answers.get("q1"),
            Some(&AnswerSelection::Single { index: 1 })
        );
    }

    #[test]
    fn unknown_question_and_bad_index_rejected() {
        let mut session = in_progress_session();
        assert!(!session.select_answer("missing", 0));
        assert!(!session.select_answer("q1", 99));
        assert!(!session.toggle_mark("missing"));
        assert!(session.answers.is_empty());
    }
}
