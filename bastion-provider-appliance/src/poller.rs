//! Bounded polling of remote operation state
//!
//! `StateWaiter` turns a point-in-time status query into a wait for a target
//! state. It knows nothing about orders or processes: callers pass the state
//! sets and map explicit failure states to errors inside their refresh closure.

use std::future::Future;
use std::time::Duration;

use log::{debug, warn};
use tokio::time::{Instant, sleep, timeout_at};
use tokio_util::sync::CancellationToken;

use crate::error::{ApplianceError, ApplianceResult};

/// Timing parameters for one wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitConfig {
    /// Time to wait before the first refresh
    pub delay: Duration,
    /// Time between refreshes
    pub poll_interval: Duration,
    /// Lower bound for the time between refreshes
    pub min_timeout: Duration,
    /// Overall time budget, including `delay`
    pub timeout: Duration,
}

impl WaitConfig {
    pub fn new(timeout: Duration) -> Self {
        Self {
            delay: Duration::ZERO,
            poll_interval: Duration::from_secs(10),
            min_timeout: Duration::ZERO,
            timeout,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_min_timeout(mut self, min_timeout: Duration) -> Self {
        self.min_timeout = min_timeout;
        self
    }

    /// Effective time between two refreshes
    pub fn interval(&self) -> Duration {
        self.poll_interval.max(self.min_timeout)
    }
}

/// Waits for a remote state machine to reach one of its target states
#[derive(Debug, Clone)]
pub struct StateWaiter {
    operation: String,
    pending: Vec<String>,
    target: Vec<String>,
    config: WaitConfig,
}

impl StateWaiter {
    pub fn new(
        operation: impl Into<String>,
        pending: &[&str],
        target: &[&str],
        config: WaitConfig,
    ) -> Self {
        Self {
            operation: operation.into(),
            pending: pending.iter().map(|s| s.to_string()).collect(),
            target: target.iter().map(|s| s.to_string()).collect(),
            config,
        }
    }

    /// Poll `refresh` until it reports a target state
    ///
    /// Errors from `refresh` end the wait immediately. States that are neither
    /// pending nor target are treated as pending. Cancellation and timeout only
    /// stop the local wait; the remote operation keeps running.
    pub async fn wait<F, Fut>(
        &self,
        mut refresh: F,
        cancel: &CancellationToken,
    ) -> ApplianceResult<String>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ApplianceResult<String>>,
    {
        let started = Instant::now();
        let deadline = started + self.config.timeout;
        let mut last_state: Option<String> = None;

        if !self.config.delay.is_zero() {
            let nap = self
                .config
                .delay
                .min(deadline.saturating_duration_since(started));
            self.pause(nap, cancel).await?;
        }

        loop {
            let polled = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(self.cancelled()),
                polled = timeout_at(deadline, refresh()) => polled,
            };
            let state = match polled {
                Ok(result) => result?,
                Err(_) => return Err(self.timed_out(last_state, started)),
            };

            if self.target.contains(&state) {
                debug!(
                    "{} reached {} after {:?}",
                    self.operation,
                    state,
                    started.elapsed()
                );
                return Ok(state);
            }
            if self.pending.contains(&state) {
                debug!("{} is {}", self.operation, state);
            } else {
                warn!(
                    "{} reported unexpected state {:?}, still waiting",
                    self.operation, state
                );
            }
            last_state = Some(state);

            let now = Instant::now();
            if now >= deadline {
                return Err(self.timed_out(last_state, started));
            }
            let nap = self.config.interval().min(deadline - now);
            self.pause(nap, cancel).await?;
        }
    }

    async fn pause(&self, nap: Duration, cancel: &CancellationToken) -> ApplianceResult<()> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(self.cancelled()),
            _ = sleep(nap) => Ok(()),
        }
    }

    fn cancelled(&self) -> ApplianceError {
        ApplianceError::Cancelled {
            operation: self.operation.clone(),
        }
    }

    fn timed_out(&self, last_state: Option<String>, started: Instant) -> ApplianceError {
        ApplianceError::Timeout {
            operation: self.operation.clone(),
            last_state,
            elapsed: started.elapsed(),
        }
    }
}
