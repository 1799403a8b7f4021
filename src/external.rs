//! Contracts with the excluded subsystems: exam data, camera, face
//! detection, and the submission endpoint. The engine owns none of these;
//! it only drives them.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{ExamData, SessionSnapshot, SubmissionReceipt};

/// Opaque camera frame. The engine never decodes it; it is only handed to
/// the feature extractor.
#[derive(Debug, Clone)]
pub struct ImageFrame {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Fixed-length numeric summary of a detected face, compared within the
/// current session only.
pub type FeatureVector = Vec<f32>;

#[async_trait]
pub trait ExamProvider: Send + Sync {
    async fn load_exam(&self, exam_id: &str) -> Result<ExamData>;
}

#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn capture_frame(&self) -> Result<ImageFrame>;
}

/// Face detection plus feature extraction over one frame: zero, one, or
/// many vectors. CPU-bound; the engine calls it on a blocking worker.
pub trait FeatureExtractor: Send + Sync {
    fn extract_face_vectors(&self, frame: &ImageFrame) -> Result<Vec<FeatureVector>>;
}

/// The submission endpoint. The session controller guarantees at most one
/// successful call per session.
#[async_trait]
pub trait SubmissionSink: Send + Sync {
    async fn submit(&self, snapshot: &SessionSnapshot) -> Result<SubmissionReceipt>;
}
