pub mod exam;
pub mod session;
pub mod snapshot;

pub use exam::{AnswerOption, ExamData, Question, QuestionKind};
pub use session::{AnswerSelection, ExamSession, Lifecycle};
pub use snapshot::{
    SessionSnapshot, SessionView, SubmissionReceipt, SubmitTrigger, ViolationSummary,
};
