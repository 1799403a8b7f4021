use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::external::{FeatureExtractor, FrameSource};
use crate::session::signal::MonitorSignal;
use crate::violations::ViolationLog;

use super::loop_worker::verification_loop;
use super::ReferenceIdentity;

/// Handle pair around the verification loop task. Created disabled;
/// `start` spawns the loop, `stop` cancels and joins it. A session can
/// re-arm the monitor after a retriable submission failure.
pub struct IdentityMonitor {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl IdentityMonitor {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    pub(crate) fn start(
        &mut self,
        reference: ReferenceIdentity,
        frames: Arc<dyn FrameSource>,
        extractor: Arc<dyn FeatureExtractor>,
        violations: Arc<Mutex<ViolationLog>>,
        signals: mpsc::UnboundedSender<MonitorSignal>,
        config: EngineConfig,
    ) -> Result<()> {
        if self.handle.is_some() {
            bail!("identity monitor already active");
        }

        let cancel_token = CancellationToken::new();
        let token_clone = cancel_token.clone();

        let handle = tokio::spawn(verification_loop(
            reference,
            frames,
            extractor,
            violations,
            signals,
            config,
            token_clone,
        ));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    /// Cancel the loop and wait for it to drain. Idempotent; safe to call
    /// after the loop has already exited on a block decision.
    pub(crate) async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("verification loop task failed to join")?;
        }
        Ok(())
    }
}

impl Default for IdentityMonitor {
    fn default() -> Self {
        Self::new()
    }
}
