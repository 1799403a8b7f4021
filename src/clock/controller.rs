use std::{sync::Arc, time::Duration};

use anyhow::{bail, Result};
use log::info;
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
    time,
};

use crate::session::signal::MonitorSignal;

use super::state::{ClockState, ClockStatus, TickOutcome};

/// The exam countdown: one ticker task producing 1 Hz decrements into the
/// session controller's signal channel, a single terminal `TimeExpired`,
/// and advisory threshold crossings along the way.
#[derive(Clone)]
pub struct Clock {
    state: Arc<Mutex<ClockState>>,
    ticker: Arc<Mutex<Option<JoinHandle<()>>>>,
    signals: mpsc::UnboundedSender<MonitorSignal>,
    warning_at: u32,
    critical_at: u32,
}

impl Clock {
    pub(crate) fn new(
        signals: mpsc::UnboundedSender<MonitorSignal>,
        warning_at: u32,
        critical_at: u32,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(ClockState::new())),
            ticker: Arc::new(Mutex::new(None)),
            signals,
            warning_at,
            critical_at,
        }
    }

    pub(crate) async fn start(&self, duration_secs: u32) -> Result<()> {
        if duration_secs == 0 {
            bail!("duration_secs must be greater than zero");
        }

        {
            let mut state = self.state.lock().await;
            if state.status == ClockStatus::Running {
                bail!("clock already running");
            }
            state.arm(duration_secs);
        }

        self.spawn_ticker().await;
        info!("clock started with {duration_secs}s remaining");
        Ok(())
    }

    /// Idempotent halt. Remaining seconds are preserved so the clock can
    /// resume after a retriable submission failure.
    pub(crate) async fn stop(&self) {
        self.state.lock().await.stop();
        if let Some(handle) = self.ticker.lock().await.take() {
            handle.abort();
        }
    }

    async fn spawn_ticker(&self) {
        let mut ticker_guard = self.ticker.lock().await;
        if let Some(handle) = ticker_guard.take() {
            handle.abort();
        }

        let state = self.state.clone();
        let signals = self.signals.clone();
        let warning_at = self.warning_at;
        let critical_at = self.critical_at;

        let handle = tokio::spawn(async move {
            let mut interval = time::interval(Duration::from_secs(1));
            // The first interval tick completes immediately; consume it so
            // the first decrement lands a full second after start.
            interval.tick().await;
            loop {
                interval.tick().await;

                let outcome = {
                    let mut guard = state.lock().await;
                    guard.tick(warning_at, critical_at)
                };

                match outcome {
                    TickOutcome::Ignored => break,
                    TickOutcome::Running {
                        seconds_remaining,
                        advisory,
                    } => {
                        let _ = signals.send(MonitorSignal::Tick { seconds_remaining });
                        if let Some(level) = advisory {
                            let _ = signals.send(MonitorSignal::TimeWarning {
                                level,
                                seconds_remaining,
                            });
                        }
                    }
                    TickOutcome::Expired => {
                        let _ = signals.send(MonitorSignal::Tick {
                            seconds_remaining: 0,
                        });
                        let _ = signals.send(MonitorSignal::TimeExpired);
                        break;
                    }
                }
            }
        });

        *ticker_guard = Some(handle);
    }
}
