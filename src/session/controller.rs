use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use log::{debug, error, info, warn};
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
    time,
};

use crate::{
    behavior::{BehaviorEvent, BehaviorOutcome, BehaviorWatcher},
    clock::Clock,
    config::EngineConfig,
    events::{BlockKind, EngineEvent, WarningKind},
    external::{ExamProvider, FeatureExtractor, FeatureVector, FrameSource, SubmissionSink},
    identity::{IdentityMonitor, ReferenceIdentity},
    models::{
        ExamSession, Lifecycle, SessionSnapshot, SessionView, SubmitTrigger,
    },
    violations::ViolationLog,
};

use super::signal::MonitorSignal;

/// The top-level session state machine.
///
/// Sole writer of `ExamSession` and sole caller of the submission sink.
/// Monitors raise signals into the internal channel; the arbiter task is
/// their single consumer, so competing triggers are serialized and the
/// submission guard makes the dispatch exactly-once.
#[derive(Clone)]
pub struct SessionController {
    config: EngineConfig,
    session: Arc<Mutex<Option<ExamSession>>>,
    violations: Arc<Mutex<ViolationLog>>,
    reference: Arc<Mutex<Option<ReferenceIdentity>>>,
    clock: Clock,
    identity: Arc<Mutex<IdentityMonitor>>,
    behavior: Arc<Mutex<BehaviorWatcher>>,
    exam_provider: Arc<dyn ExamProvider>,
    frames: Arc<dyn FrameSource>,
    extractor: Arc<dyn FeatureExtractor>,
    sink: Arc<dyn SubmissionSink>,
    events: mpsc::UnboundedSender<EngineEvent>,
    signal_tx: mpsc::UnboundedSender<MonitorSignal>,
    signal_rx: Arc<Mutex<Option<mpsc::UnboundedReceiver<MonitorSignal>>>>,
    arbiter: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl SessionController {
    /// Build a controller and the receiver its events flow out of.
    pub fn new(
        config: EngineConfig,
        exam_provider: Arc<dyn ExamProvider>,
        frames: Arc<dyn FrameSource>,
        extractor: Arc<dyn FeatureExtractor>,
        sink: Arc<dyn SubmissionSink>,
    ) -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();

        let clock = Clock::new(
            signal_tx.clone(),
            config.time_warning_secs,
            config.time_critical_secs,
        );
        let behavior = BehaviorWatcher::new(config.max_tab_refocus);

        let controller = Self {
            config,
            session: Arc::new(Mutex::new(None)),
            violations: Arc::new(Mutex::new(ViolationLog::new())),
            reference: Arc::new(Mutex::new(None)),
            clock,
            identity: Arc::new(Mutex::new(IdentityMonitor::new())),
            behavior: Arc::new(Mutex::new(behavior)),
            exam_provider,
            frames,
            extractor,
            sink,
            events: events_tx,
            signal_tx,
            signal_rx: Arc::new(Mutex::new(Some(signal_rx))),
            arbiter: Arc::new(Mutex::new(None)),
        };

        (controller, events_rx)
    }

    /// Fetch exam data and create the session in `NotStarted`. A previous
    /// session must have reached a terminal state first.
    pub async fn load_exam(&self, exam_id: &str) -> Result<SessionView> {
        let exam = self
            .exam_provider
            .load_exam(exam_id)
            .await
            .with_context(|| format!("failed to load exam {exam_id}"))?;
        if exam.duration_secs == 0 {
            bail!("exam duration must be greater than zero");
        }

        let mut guard = self.session.lock().await;
        if let Some(existing) = guard.as_ref() {
            if !existing.lifecycle.is_terminal() {
                bail!("a session is already active");
            }
        }

        let session = ExamSession::new(exam);
        info!(
            "exam {} loaded as session {} ({} questions, {}s)",
            session.exam_id,
            session.session_id,
            session.questions.len(),
            session.duration_secs
        );

        *self.violations.lock().await = ViolationLog::new();
        *self.reference.lock().await = None;

        let view = build_view(&session, &*self.violations.lock().await);
        *guard = Some(session);
        Ok(view)
    }

    pub async fn begin_verification(&self) -> Result<()> {
        {
            let mut guard = self.session.lock().await;
            let session = guard.as_mut().ok_or_else(|| anyhow!("no exam loaded"))?;
            if session.lifecycle != Lifecycle::NotStarted {
                bail!("verification can only begin from a fresh session");
            }
            session.lifecycle = Lifecycle::VerifyingIdentity;
        }
        self.emit_lifecycle(Lifecycle::VerifyingIdentity);
        Ok(())
    }

    /// Verification succeeded: capture the reference vector, move to
    /// `InProgress`, and start the clock and both monitors.
    pub async fn complete_verification(&self, reference_vector: FeatureVector) -> Result<()> {
        if reference_vector.is_empty() {
            bail!("reference vector must not be empty");
        }

        let duration_secs = {
            let mut guard = self.session.lock().await;
            let session = guard.as_mut().ok_or_else(|| anyhow!("no exam loaded"))?;
            if session.lifecycle != Lifecycle::VerifyingIdentity {
                bail!("no identity verification in progress");
            }
            session.lifecycle = Lifecycle::InProgress;
            session.started_at = Some(Utc::now());
            session.time_remaining_secs
        };

        *self.reference.lock().await = Some(ReferenceIdentity {
            feature_vector: reference_vector,
        });

        self.spawn_arbiter().await;
        self.start_monitors(duration_secs).await?;
        self.emit_lifecycle(Lifecycle::InProgress);
        info!("identity verified; exam in progress ({duration_secs}s)");
        Ok(())
    }

    /// Verification failed: terminal for this session. The caller may load
    /// the exam again and retry from scratch.
    pub async fn abort_verification(&self) -> Result<()> {
        {
            let mut guard = self.session.lock().await;
            let session = guard.as_mut().ok_or_else(|| anyhow!("no exam loaded"))?;
            if session.lifecycle != Lifecycle::VerifyingIdentity {
                bail!("no identity verification in progress");
            }
            session.lifecycle = Lifecycle::Failed;
        }
        self.emit_lifecycle(Lifecycle::Failed);
        warn!("identity verification failed; session failed");
        Ok(())
    }

    /// Single-choice: replace. Multi-choice: toggle. Silently rejected
    /// once the lifecycle has left `InProgress`; stray clicks during the
    /// submit transition are expected and must not crash the session.
    pub async fn select_answer(&self, question_id: &str, answer_index: usize) {
        let mut guard = self.session.lock().await;
        let Some(session) = guard.as_mut() else {
            return;
        };
        if !session.select_answer(question_id, answer_index) {
            debug!("ignored answer selection for question {question_id}");
        }
    }

    /// Toggle the review mark; same rejection rules as `select_answer`.
    pub async fn mark_question(&self, question_id: &str) {
        let mut guard = self.session.lock().await;
        let Some(session) = guard.as_mut() else {
            return;
        };
        if !session.toggle_mark(question_id) {
            debug!("ignored mark toggle for question {question_id}");
        }
    }

    /// Clipboard / tab-visibility events from the embedding shell.
    /// Suppressed entirely while a submission sequence is underway.
    pub async fn report_behavior(&self, event: BehaviorEvent) {
        let outcome = {
            let guard = self.session.lock().await;
            let Some(session) = guard.as_ref() else {
                return;
            };
            if session.lifecycle != Lifecycle::InProgress || session.submission_guard {
                return;
            }

            let mut watcher = self.behavior.lock().await;
            let mut log = self.violations.lock().await;
            watcher.observe(event, &mut log)
        };

        match outcome {
            BehaviorOutcome::Ignored => {}
            BehaviorOutcome::Advisory { kind, count } => {
                info!("behavior violation {kind:?} (count {count})");
                self.emit(EngineEvent::Warning {
                    kind: WarningKind::Behavior { kind, count },
                    countdown_secs: 0,
                });
            }
            BehaviorOutcome::Block { total_violations } => {
                warn!("tab-refocus limit reached; requesting auto-submission");
                let _ = self
                    .signal_tx
                    .send(MonitorSignal::BehaviorBlock { total_violations });
            }
        }
    }

    /// Student-initiated submission. Queued behind the arbiter like every
    /// other trigger, so it cannot race a block or the time-out into a
    /// second dispatch.
    pub async fn request_manual_submit(&self) -> Result<()> {
        {
            let guard = self.session.lock().await;
            let session = guard.as_ref().ok_or_else(|| anyhow!("no exam loaded"))?;
            if session.lifecycle != Lifecycle::InProgress {
                bail!("no exam in progress to submit");
            }
        }
        self.signal_tx
            .send(MonitorSignal::ManualSubmit)
            .map_err(|_| anyhow!("engine is not running"))?;
        Ok(())
    }

    /// Read-only state for the presentation layer.
    pub async fn snapshot(&self) -> Option<SessionView> {
        let guard = self.session.lock().await;
        let session = guard.as_ref()?;
        let violations = self.violations.lock().await;
        Some(build_view(session, &violations))
    }

    /// Discard the session: stop every monitor and the arbiter. Used when
    /// the student navigates away.
    pub async fn teardown(&self) {
        self.disable_monitors().await;
        if let Some(handle) = self.arbiter.lock().await.take() {
            handle.abort();
        }
        *self.session.lock().await = None;
        info!("session torn down");
    }

    async fn spawn_arbiter(&self) {
        let Some(mut rx) = self.signal_rx.lock().await.take() else {
            // Already consuming; one arbiter serves the controller's lifetime
            return;
        };

        let controller = self.clone();
        let handle = tokio::spawn(async move {
            while let Some(signal) = rx.recv().await {
                controller.handle_signal(signal).await;
            }
        });
        *self.arbiter.lock().await = Some(handle);
    }

    async fn handle_signal(&self, signal: MonitorSignal) {
        match signal {
            MonitorSignal::Tick { seconds_remaining } => {
                let mut guard = self.session.lock().await;
                let Some(session) = guard.as_mut() else {
                    return;
                };
                if session.lifecycle != Lifecycle::InProgress || session.submission_guard {
                    return;
                }
                session.time_remaining_secs = seconds_remaining;
                drop(guard);
                self.emit(EngineEvent::Tick { seconds_remaining });
            }
            MonitorSignal::TimeWarning {
                level,
                seconds_remaining,
            } => {
                if self.accepting_triggers().await {
                    self.emit(EngineEvent::TimeWarning {
                        level,
                        seconds_remaining,
                    });
                }
            }
            MonitorSignal::TimeExpired => self.handle_time_expired().await,
            MonitorSignal::IdentityWarning {
                kind,
                similarity_score,
                countdown_secs,
            } => {
                if self.accepting_triggers().await {
                    self.emit(EngineEvent::Warning {
                        kind: WarningKind::Identity {
                            kind,
                            similarity_score,
                        },
                        countdown_secs,
                    });
                }
            }
            MonitorSignal::IdentityBlock { total_violations } => {
                self.handle_identity_block(total_violations).await;
            }
            MonitorSignal::BehaviorBlock { total_violations } => {
                self.handle_behavior_block(total_violations).await;
            }
            MonitorSignal::ManualSubmit => self.handle_manual_submit().await,
        }
    }

    async fn handle_time_expired(&self) {
        if !self.claim_submission(Lifecycle::TimeExpired).await {
            return;
        }
        self.emit_lifecycle(Lifecycle::TimeExpired);
        self.disable_monitors().await;
        info!("exam time expired");
        self.dispatch_submission(SubmitTrigger::TimeExpired).await;
    }

    async fn handle_identity_block(&self, total_violations: u32) {
        if !self.claim_submission(Lifecycle::Blocked).await {
            return;
        }
        self.emit_lifecycle(Lifecycle::Blocked);
        self.disable_monitors().await;
        self.emit(EngineEvent::Blocked {
            kind: BlockKind::Identity,
            total_violations,
        });
        // Blocked auto-transitions into submission
        self.dispatch_submission(SubmitTrigger::IdentityBlock).await;
    }

    async fn handle_behavior_block(&self, total_violations: u32) {
        // Claim the guard before the countdown so nothing else can slip a
        // second dispatch in while it runs; lifecycle stays InProgress
        // until the countdown ends.
        if !self.claim_submission(Lifecycle::InProgress).await {
            return;
        }
        self.disable_monitors().await;
        self.emit(EngineEvent::Blocked {
            kind: BlockKind::Behavior,
            total_violations,
        });

        // Informational only; not cancellable once started
        let mut countdown_secs = self.config.auto_submit_countdown_secs;
        while countdown_secs > 0 {
            self.emit(EngineEvent::Warning {
                kind: WarningKind::AutoSubmit,
                countdown_secs,
            });
            time::sleep(Duration::from_secs(1)).await;
            countdown_secs -= 1;
        }

        self.dispatch_submission(SubmitTrigger::BehaviorBlock).await;
    }

    async fn handle_manual_submit(&self) {
        if !self.claim_submission(Lifecycle::InProgress).await {
            return;
        }
        self.disable_monitors().await;
        self.dispatch_submission(SubmitTrigger::Manual).await;
    }

    /// Atomically take the submission guard and move to the given
    /// lifecycle. Returns false when another trigger already owns the
    /// sequence; the caller then drops its trigger on the floor.
    async fn claim_submission(&self, lifecycle: Lifecycle) -> bool {
        let mut guard = self.session.lock().await;
        let Some(session) = guard.as_mut() else {
            return false;
        };
        if session.submission_guard || session.lifecycle != Lifecycle::InProgress {
            return false;
        }
        session.submission_guard = true;
        session.lifecycle = lifecycle;
        if lifecycle == Lifecycle::TimeExpired {
            session.time_remaining_secs = 0;
        }
        true
    }

    /// The single network dispatch. The caller must hold the claimed
    /// guard; by here every monitor is already disabled.
    async fn dispatch_submission(&self, trigger: SubmitTrigger) {
        let snapshot = {
            let mut guard = self.session.lock().await;
            let Some(session) = guard.as_mut() else {
                return;
            };
            session.lifecycle = Lifecycle::Submitting;
            let violations = self.violations.lock().await.summary();
            SessionSnapshot {
                session_id: session.session_id.clone(),
                exam_id: session.exam_id.clone(),
                answers: session.answers.clone(),
                marked: session.marked.iter().cloned().collect(),
                time_remaining_secs: session.time_remaining_secs,
                trigger,
                violations,
                submitted_at: Utc::now(),
            }
        };
        self.emit_lifecycle(Lifecycle::Submitting);
        info!(
            "dispatching submission for session {} ({:?}, {} answers)",
            snapshot.session_id,
            trigger,
            snapshot.answers.len()
        );

        match self.sink.submit(&snapshot).await {
            Ok(receipt) => {
                {
                    let mut guard = self.session.lock().await;
                    if let Some(session) = guard.as_mut() {
                        session.lifecycle = Lifecycle::Submitted;
                    }
                }
                self.emit_lifecycle(Lifecycle::Submitted);
                self.emit(EngineEvent::SubmissionResult {
                    success: true,
                    detail: receipt.submission_id,
                });
            }
            Err(err) => {
                error!("submission failed: {err:?}");
                self.handle_submission_failure(trigger, err).await;
            }
        }
    }

    /// A failed dispatch is retriable only for a manual submit with time
    /// still on the clock; blocked and expired sessions have nothing left
    /// to go back to.
    async fn handle_submission_failure(&self, trigger: SubmitTrigger, err: anyhow::Error) {
        let retriable_remaining = {
            let guard = self.session.lock().await;
            match guard.as_ref() {
                Some(session)
                    if trigger == SubmitTrigger::Manual && session.time_remaining_secs > 0 =>
                {
                    Some(session.time_remaining_secs)
                }
                _ => None,
            }
        };

        if let Some(remaining_secs) = retriable_remaining {
            {
                let mut guard = self.session.lock().await;
                if let Some(session) = guard.as_mut() {
                    session.submission_guard = false;
                    session.lifecycle = Lifecycle::InProgress;
                }
            }
            self.emit_lifecycle(Lifecycle::InProgress);

            // Resume proctoring from the preserved remaining time
            if let Err(restart_err) = self.start_monitors(remaining_secs).await {
                error!("failed to resume monitors after submission failure: {restart_err:?}");
            }
            warn!("submission failed; session resumed with {remaining_secs}s remaining");
        } else {
            {
                let mut guard = self.session.lock().await;
                if let Some(session) = guard.as_mut() {
                    session.lifecycle = Lifecycle::Failed;
                }
            }
            self.emit_lifecycle(Lifecycle::Failed);
        }

        self.emit(EngineEvent::SubmissionResult {
            success: false,
            detail: err.to_string(),
        });
    }

    async fn start_monitors(&self, remaining_secs: u32) -> Result<()> {
        self.clock.start(remaining_secs).await?;

        let reference = self
            .reference
            .lock()
            .await
            .clone()
            .ok_or_else(|| anyhow!("missing reference identity"))?;
        self.identity.lock().await.start(
            reference,
            Arc::clone(&self.frames),
            Arc::clone(&self.extractor),
            Arc::clone(&self.violations),
            self.signal_tx.clone(),
            self.config.clone(),
        )?;

        self.behavior.lock().await.enable();
        Ok(())
    }

    /// First action of every submission sequence: immediate, and cancels
    /// all pending timers. Late callbacks see their disabled flags and
    /// discard themselves.
    async fn disable_monitors(&self) {
        self.clock.stop().await;
        if let Err(err) = self.identity.lock().await.stop().await {
            warn!("identity monitor shutdown: {err:?}");
        }
        self.behavior.lock().await.disable();
    }

    async fn accepting_triggers(&self) -> bool {
        let guard = self.session.lock().await;
        guard
            .as_ref()
            .map(|session| {
                session.lifecycle == Lifecycle::InProgress && !session.submission_guard
            })
            .unwrap_or(false)
    }

    fn emit(&self, event: EngineEvent) {
        let _ = self.events.send(event);
    }

    fn emit_lifecycle(&self, lifecycle: Lifecycle) {
        self.emit(EngineEvent::LifecycleChanged { lifecycle });
    }
}

fn build_view(session: &ExamSession, violations: &ViolationLog) -> SessionView {
    SessionView {
        session_id: session.session_id.clone(),
        exam_id: session.exam_id.clone(),
        lifecycle: session.lifecycle,
        started_at: session.started_at,
        time_remaining_secs: session.time_remaining_secs,
        answered_count: session.answered_count(),
        question_count: session.questions.len(),
        answers: session.answers.clone(),
        marked: session.marked.iter().cloned().collect(),
        violations: violations.summary(),
    }
}
