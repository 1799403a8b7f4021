use std::collections::VecDeque;
use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc, Mutex,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedReceiver;

use proctor_engine::{
    AnswerOption, EngineConfig, EngineEvent, ExamData, ExamProvider, FeatureExtractor,
    FeatureVector, FrameSource, ImageFrame, Question, QuestionKind, SessionController,
    SessionSnapshot, SubmissionReceipt, SubmissionSink,
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn reference_vector() -> FeatureVector {
    vec![1.0, 0.0, 0.0]
}

/// One face, matching the reference exactly.
pub fn matching_face() -> Vec<FeatureVector> {
    vec![reference_vector()]
}

/// One face, orthogonal to the reference: distance 1.0, past the cutoff.
pub fn mismatched_face() -> Vec<FeatureVector> {
    vec![vec![0.0, 1.0, 0.0]]
}

pub fn no_face() -> Vec<FeatureVector> {
    Vec::new()
}

pub fn two_faces() -> Vec<FeatureVector> {
    vec![reference_vector(), vec![0.0, 0.0, 1.0]]
}

pub fn sample_exam(duration_secs: u32) -> ExamData {
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
        title: "History midterm".into(),
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
        duration_secs,
        metadata: serde_json::json!({ "subject": "history" }),
    }
}

pub struct FixedExamProvider {
    exam: ExamData,
}

#[async_trait]
impl ExamProvider for FixedExamProvider {
    async fn load_exam(&self, _exam_id: &str) -> Result<ExamData> {
        Ok(self.exam.clone())
    }
}

pub struct StaticFrameSource;

#[async_trait]
impl FrameSource for StaticFrameSource {
    async fn capture_frame(&self) -> Result<ImageFrame> {
        Ok(ImageFrame {
            bytes: vec![0; 16],
            width: 4,
            height: 4,
        })
    }
}

/// Extractor that plays back a scripted sequence of detection results,
/// one per verification cycle, then repeats a fallback.
pub struct ScriptedExtractor {
    script: Mutex<VecDeque<Vec<FeatureVector>>>,
    fallback: Vec<FeatureVector>,
}

impl ScriptedExtractor {
    pub fn repeating(fallback: Vec<FeatureVector>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback,
        }
    }

    pub fn scripted(cycles: Vec<Vec<FeatureVector>>, fallback: Vec<FeatureVector>) -> Self {
        Self {
            script: Mutex::new(cycles.into()),
            fallback,
        }
    }
}

impl FeatureExtractor for ScriptedExtractor {
    fn extract_face_vectors(&self, _frame: &ImageFrame) -> Result<Vec<FeatureVector>> {
        let next = self.script.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| self.fallback.clone()))
    }
}

/// Submission sink that counts calls, keeps the last snapshot, and can be
/// told to fail its first N calls.
pub struct RecordingSink {
    calls: AtomicU32,
    fail_first: u32,
    last: Mutex<Option<SessionSnapshot>>,
}

impl RecordingSink {
    pub fn ok() -> Arc<Self> {
        Self::failing_first(0)
    }

    pub fn failing_first(fail_first: u32) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            fail_first,
            last: Mutex::new(None),
        })
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_snapshot(&self) -> Option<SessionSnapshot> {
        self.last.lock().unwrap().clone()
    }
}

#[async_trait]
impl SubmissionSink for RecordingSink {
    async fn submit(&self, snapshot: &SessionSnapshot) -> Result<SubmissionReceipt> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        *self.last.lock().unwrap() = Some(snapshot.clone());
        if call <= self.fail_first {
            return Err(anyhow!("submission endpoint unavailable"));
        }
        Ok(SubmissionReceipt {
            submission_id: format!("sub-{call}"),
        })
    }
}

pub fn build_engine(
    exam: ExamData,
    config: EngineConfig,
    extractor: ScriptedExtractor,
    sink: Arc<RecordingSink>,
) -> (SessionController, UnboundedReceiver<EngineEvent>) {
    SessionController::new(
        config,
        Arc::new(FixedExamProvider { exam }),
        Arc::new(StaticFrameSource),
        Arc::new(extractor),
        sink,
    )
}

/// Load, verify, and enter `InProgress` with the canonical reference.
pub async fn start_exam(controller: &SessionController) {
    controller.load_exam("exam-1").await.unwrap();
    controller.begin_verification().await.unwrap();
    controller
        .complete_verification(reference_vector())
        .await
        .unwrap();
}

pub fn drain(rx: &mut UnboundedReceiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
