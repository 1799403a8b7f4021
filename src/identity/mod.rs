mod loop_worker;
mod monitor;
pub mod similarity;

pub use monitor::IdentityMonitor;

use crate::external::FeatureVector;

/// The feature vector captured at the moment identity verification
/// succeeded. Immutable for the lifetime of the session.
#[derive(Debug, Clone)]
pub struct ReferenceIdentity {
    pub feature_vector: FeatureVector,
}
