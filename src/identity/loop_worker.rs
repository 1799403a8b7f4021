use std::sync::Arc;

use anyhow::{Context, Result};
use log::{info, warn};
use tokio::sync::{mpsc, Mutex};
use tokio::time::{interval, sleep, timeout, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::external::{FeatureExtractor, FrameSource};
use crate::session::signal::MonitorSignal;
use crate::violations::{ViolationClass, ViolationKind, ViolationLog};

use super::similarity::{feature_distance, similarity_percent};
use super::ReferenceIdentity;

enum CycleOutcome {
    Clean,
    Violation {
        kind: ViolationKind,
        similarity_score: Option<f64>,
    },
}

/// The continuous verification loop: one cycle per interval, strictly
/// serialized (the next sample waits for the in-flight one), torn down by
/// the cancellation token.
///
/// The grace countdown lives in this task, so cancelling the token cancels
/// the countdown and the sampling together; there is no state for them to
/// disagree on.
pub(crate) async fn verification_loop(
    reference: ReferenceIdentity,
    frames: Arc<dyn FrameSource>,
    extractor: Arc<dyn FeatureExtractor>,
    violations: Arc<Mutex<ViolationLog>>,
    signals: mpsc::UnboundedSender<MonitorSignal>,
    config: EngineConfig,
    cancel_token: CancellationToken,
) {
    let mut ticker = interval(Duration::from_secs(config.identity_check_interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first interval tick completes immediately; consume it so the
    // first sample lands one full interval after enablement.
    ticker.tick().await;

    // Open warning window: remaining grace seconds plus the violation
    // being remediated. Both cleared by a clean cycle.
    let mut grace_remaining: Option<u32> = None;
    let mut open_warning: Option<(ViolationKind, Option<f64>)> = None;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let cycle = run_cycle(
                    &frames,
                    &extractor,
                    &reference,
                    config.identity_distance_cutoff,
                );
                let outcome =
                    timeout(Duration::from_secs(config.capture_timeout_secs), cycle).await;

                // Disablement may have raced the in-flight cycle; discard
                // its result rather than raise anything late.
                if cancel_token.is_cancelled() {
                    break;
                }

                match outcome {
                    Ok(Ok(CycleOutcome::Clean)) => {
                        let mut log = violations.lock().await;
                        if log.consecutive(ViolationClass::Identity) > 0 {
                            log.reset(ViolationClass::Identity);
                            info!("identity verification recovered; violation streak reset");
                        }
                        drop(log);
                        grace_remaining = None;
                        open_warning = None;
                    }
                    Ok(Ok(CycleOutcome::Violation { kind, similarity_score })) => {
                        let count = violations.lock().await.record(kind, similarity_score);
                        warn!("identity violation {kind:?} (consecutive {count})");

                        if count >= config.max_identity_violations {
                            raise_block(&violations, &signals).await;
                            break;
                        }

                        // Only the first violation of a streak opens the
                        // grace window; later ones ride the same countdown.
                        if grace_remaining.is_none() {
                            grace_remaining = Some(config.grace_period_secs);
                        }
                        open_warning = Some((kind, similarity_score));
                        let _ = signals.send(MonitorSignal::IdentityWarning {
                            kind,
                            similarity_score,
                            countdown_secs: grace_remaining.unwrap_or(0),
                        });
                    }
                    Ok(Err(err)) => {
                        // Recoverable: not a violation, retried next interval
                        warn!("identity cycle failed: {err:?}");
                    }
                    Err(_) => {
                        warn!(
                            "identity cycle timeout (> {}s)",
                            config.capture_timeout_secs
                        );
                    }
                }
            }
            _ = sleep(Duration::from_secs(1)), if grace_remaining.is_some() => {
                let remaining = grace_remaining
                    .map(|secs| secs.saturating_sub(1))
                    .unwrap_or(0);

                if remaining == 0 {
                    // Grace expired while still in a violating state
                    raise_block(&violations, &signals).await;
                    break;
                }

                grace_remaining = Some(remaining);
                if let Some((kind, similarity_score)) = open_warning {
                    let _ = signals.send(MonitorSignal::IdentityWarning {
                        kind,
                        similarity_score,
                        countdown_secs: remaining,
                    });
                }
            }
            _ = cancel_token.cancelled() => {
                info!("identity monitor shutting down");
                break;
            }
        }
    }
}

async fn run_cycle(
    frames: &Arc<dyn FrameSource>,
    extractor: &Arc<dyn FeatureExtractor>,
    reference: &ReferenceIdentity,
    distance_cutoff: f64,
) -> Result<CycleOutcome> {
    let frame = frames.capture_frame().await.context("frame capture failed")?;

    let vectors = tokio::task::spawn_blocking({
        let extractor = Arc::clone(extractor);
        move || extractor.extract_face_vectors(&frame)
    })
    .await
    .context("feature extraction worker join failed")?
    .context("feature extraction failed")?;

    Ok(match vectors.as_slice() {
        [] => CycleOutcome::Violation {
            kind: ViolationKind::NoFaceDetected,
            similarity_score: None,
        },
        [vector] => {
            let distance = feature_distance(vector, &reference.feature_vector);
            if distance > distance_cutoff {
                CycleOutcome::Violation {
                    kind: ViolationKind::IdentityMismatch,
                    similarity_score: Some(similarity_percent(distance)),
                }
            } else {
                CycleOutcome::Clean
            }
        }
        _ => CycleOutcome::Violation {
            kind: ViolationKind::MultipleFacesDetected,
            similarity_score: None,
        },
    })
}

async fn raise_block(
    violations: &Arc<Mutex<ViolationLog>>,
    signals: &mpsc::UnboundedSender<MonitorSignal>,
) {
    let total_violations = violations.lock().await.total() as u32;
    warn!("identity block raised after {total_violations} total violations");
    let _ = signals.send(MonitorSignal::IdentityBlock { total_violations });
}
