//! The supervised streaming loop.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::engine::{AttemptOutcome, StreamEngine};
use super::job::StreamJob;

/// Default delay before restarting a failed attempt.
pub const DEFAULT_RESTART_DELAY: Duration = Duration::from_secs(5);

/// Supervisor tuning.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Fixed delay before restarting after a failed attempt. Constant rather
    /// than exponential: persistent failures are for the operator to resolve,
    /// the delay only keeps the loop from hammering the ingest endpoint.
    pub restart_delay: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            restart_delay: DEFAULT_RESTART_DELAY,
        }
    }
}

/// Control-loop state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// An attempt is about to be launched.
    Running,
    /// Waiting out the restart delay after a failed attempt.
    Backoff(Duration),
    /// Terminal: clean stop, either a zero encoder exit or operator
    /// cancellation.
    Stopped,
    /// Terminal: the run was aborted before streaming could start.
    Aborted,
}

impl SupervisorState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Aborted)
    }
}

impl std::fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Running => "running",
            Self::Backoff(_) => "backoff",
            Self::Stopped => "stopped",
            Self::Aborted => "aborted",
        };
        write!(f, "{s}")
    }
}

/// Restart-on-crash supervisor for a single streaming job.
pub struct Supervisor {
    engine: Arc<dyn StreamEngine>,
    config: SupervisorConfig,
}

impl Supervisor {
    pub fn new(engine: Arc<dyn StreamEngine>) -> Self {
        Self::with_config(engine, SupervisorConfig::default())
    }

    pub fn with_config(engine: Arc<dyn StreamEngine>, config: SupervisorConfig) -> Self {
        Self { engine, config }
    }

    /// Map an attempt outcome to the next state.
    ///
    /// Crashes and launch errors take the same recovery path. Treating launch
    /// errors (e.g. a missing encoder binary) as transient is a recorded
    /// trade-off: the loop stays self-healing and the operator decides when
    /// to give up.
    fn transition(&self, outcome: &AttemptOutcome) -> SupervisorState {
        match outcome {
            AttemptOutcome::Completed | AttemptOutcome::Interrupted => SupervisorState::Stopped,
            AttemptOutcome::Crashed(_) | AttemptOutcome::LaunchFailed(_) => {
                SupervisorState::Backoff(self.config.restart_delay)
            }
        }
    }

    /// Run the streaming loop until a terminal state is reached.
    ///
    /// Retries are unbounded; only a clean encoder exit or operator
    /// cancellation ends the loop. Cancellation is observed while blocked on
    /// the encoder, while sleeping in backoff, and before launching a new
    /// attempt.
    pub async fn run(&self, job: &StreamJob, cancel: CancellationToken) -> SupervisorState {
        let mut state = SupervisorState::Running;
        let mut attempt: u64 = 0;

        loop {
            state = match state {
                SupervisorState::Running => {
                    if cancel.is_cancelled() {
                        info!("stop requested; not starting a new attempt");
                        SupervisorState::Stopped
                    } else {
                        attempt += 1;
                        info!(attempt, path = %job.local_path.display(), "starting stream");
                        let outcome = self.engine.run_attempt(job, &cancel).await;
                        self.report(attempt, &outcome);
                        self.transition(&outcome)
                    }
                }
                SupervisorState::Backoff(delay) => {
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            info!("stop requested during restart delay");
                            SupervisorState::Stopped
                        }
                        _ = tokio::time::sleep(delay) => SupervisorState::Running,
                    }
                }
                terminal => return terminal,
            };
        }
    }

    /// Operator-visible status line for one finished attempt.
    fn report(&self, attempt: u64, outcome: &AttemptOutcome) {
        let delay_secs = self.config.restart_delay.as_secs();
        match outcome {
            AttemptOutcome::Completed => info!(attempt, "encoder exited cleanly; stopping"),
            AttemptOutcome::Crashed(code) => warn!(
                attempt,
                exit_code = code,
                delay_secs,
                "stream crashed; restarting after delay"
            ),
            AttemptOutcome::Interrupted => info!(attempt, "stream stopped by operator"),
            AttemptOutcome::LaunchFailed(detail) => warn!(
                attempt,
                error = %detail,
                delay_secs,
                "could not launch encoder; retrying after delay"
            ),
        }
    }
}
