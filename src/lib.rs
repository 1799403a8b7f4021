//! Proctored exam session engine.
//!
//! A headless state machine for timed, camera-proctored exams: a 1 Hz
//! countdown clock, a continuous identity-verification loop sampling the
//! webcam against a reference feature vector, an anti-cheat watcher for
//! clipboard and tab-focus events, and a session controller that converges
//! every submission trigger (time-out, manual submit, identity block,
//! behavior block) onto exactly one call to the submission sink.
//!
//! The engine renders nothing and stores nothing. The embedding shell
//! supplies the camera, the face detector, the exam data, and the
//! submission endpoint through the traits in the external-interface
//! module, drives the session through [`SessionController`] commands, and
//! renders the [`EngineEvent`] stream.

mod behavior;
mod clock;
mod config;
mod events;
mod external;
mod identity;
mod models;
mod session;
mod violations;

pub use behavior::BehaviorEvent;
pub use config::EngineConfig;
pub use events::{BlockKind, EngineEvent, TimeWarningLevel, WarningKind};
pub use external::{
    ExamProvider, FeatureExtractor, FeatureVector, FrameSource, ImageFrame, SubmissionSink,
};
pub use identity::similarity::{feature_distance, similarity_percent};
pub use identity::ReferenceIdentity;
pub use models::{
    AnswerOption, AnswerSelection, ExamData, ExamSession, Lifecycle, Question, QuestionKind,
    SessionSnapshot, SessionView, SubmissionReceipt, SubmitTrigger, ViolationSummary,
};
pub use session::SessionController;
pub use violations::{ViolationClass, ViolationKind, ViolationLog, ViolationRecord};
