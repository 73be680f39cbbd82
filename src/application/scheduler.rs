//! Step-sequencing scheduler
//!
//! Runs the automation phases exactly once each, in a fixed order. A phase
//! may start only when the shared readiness state is settled: no page load
//! in progress and no fetch in flight. Collaborators raise and clear those
//! flags themselves; the scheduler only observes them.
//!
//! Every wait and every phase runs under a timeout so a hung page load
//! aborts the run instead of stalling it forever.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{error, info};

use crate::application::phases::{PhaseError, StepPhase};

/// The two readiness conditions gating phase transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Readiness {
    /// A page navigation has started and not yet finished
    load_in_progress: bool,

    /// The fetch phase's sub-recursion is running. Set before the fetch
    /// starts and cleared only once its result has been handed off.
    fetch_in_flight: bool,
}

impl Readiness {
    fn settled(self) -> bool {
        !self.load_in_progress && !self.fetch_in_flight
    }
}

/// Shared readiness flags, passed to whichever collaborator raises or
/// clears them. Waiters are woken on every change instead of polling.
pub struct SchedulerState {
    tx: watch::Sender<Readiness>,
}

impl SchedulerState {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Readiness::default());
        Self { tx }
    }

    pub fn begin_navigation(&self) {
        self.tx.send_modify(|r| r.load_in_progress = true);
    }

    pub fn end_navigation(&self) {
        self.tx.send_modify(|r| r.load_in_progress = false);
    }

    pub fn begin_fetch(&self) {
        self.tx.send_modify(|r| r.fetch_in_flight = true);
    }

    pub fn end_fetch(&self) {
        self.tx.send_modify(|r| r.fetch_in_flight = false);
    }

    pub fn is_settled(&self) -> bool {
        self.tx.borrow().settled()
    }

    /// Resolve once both readiness conditions hold.
    pub async fn settled(&self) {
        let mut rx = self.tx.subscribe();
        loop {
            if rx.borrow_and_update().settled() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for SchedulerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Scheduler failures. Both terminate the whole run; a partial automation
/// run in an unknown page state cannot be safely resumed.
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Run is stuck: phase '{phase}' exceeded its {budget_seconds}s budget")]
    Stuck {
        phase: &'static str,
        budget_seconds: u64,
    },

    #[error("Phase '{phase}' failed: {source}")]
    Phase {
        phase: &'static str,
        #[source]
        source: PhaseError,
    },
}

/// Executes one named phase. Implemented by the production step runner;
/// tests substitute scripted executors.
#[async_trait]
pub trait PhaseExecutor: Send {
    async fn run_phase(&mut self, phase: StepPhase) -> Result<(), PhaseError>;
}

/// Drives the fixed phase sequence to completion.
pub struct StepScheduler {
    state: Arc<SchedulerState>,
    phase_timeout: Duration,
}

impl StepScheduler {
    pub fn new(state: Arc<SchedulerState>, phase_timeout: Duration) -> Self {
        Self {
            state,
            phase_timeout,
        }
    }

    /// Execute every phase once, in order. Each phase waits for the shared
    /// state to settle, then runs under the phase budget. Only one phase is
    /// ever executing; phases never overlap.
    pub async fn run<E>(&self, runner: &mut E) -> Result<(), SchedulerError>
    where
        E: PhaseExecutor + ?Sized,
    {
        let budget_seconds = self.phase_timeout.as_secs();

        for phase in StepPhase::SEQUENCE {
            timeout(self.phase_timeout, self.state.settled())
                .await
                .map_err(|_| SchedulerError::Stuck {
                    phase: phase.name(),
                    budget_seconds,
                })?;

            info!("▶ Phase: {}", phase.name());

            let outcome = timeout(self.phase_timeout, runner.run_phase(phase))
                .await
                .map_err(|_| SchedulerError::Stuck {
                    phase: phase.name(),
                    budget_seconds,
                })?;

            if let Err(source) = outcome {
                error!("Phase '{}' failed: {}", phase.name(), source);
                return Err(SchedulerError::Phase {
                    phase: phase.name(),
                    source,
                });
            }
        }

        info!("✅ All phases completed");
        Ok(())
    }
}
