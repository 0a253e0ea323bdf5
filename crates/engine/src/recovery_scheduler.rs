// SPDX-License-Identifier: MIT

//! Gates deep health probes to once per `check_interval_sec`, and forwards
//! probe outcomes into the circuit breaker only while it is `HALF_OPEN` —
//! probing more often than that would hammer a downed Plex, and forwarding
//! successes while `CLOSED` would be meaningless (nothing is being tested).

use crate::circuit_breaker::{BreakerError, CircuitBreaker};
use crate::outage_history::OutageHistory;
use s2p_core::{BreakerStateKind, ErrorKind, RecoveryState};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum RecoverySchedulerError {
    #[error(transparent)]
    Store(#[from] s2p_storage::AtomicStoreError),
    #[error(transparent)]
    Breaker(#[from] BreakerError),
}

pub struct RecoveryScheduler {
    path: PathBuf,
    check_interval: Duration,
    state: RecoveryState,
}

impl RecoveryScheduler {
    pub fn load(path: &Path, check_interval: Duration) -> Result<Self, RecoverySchedulerError> {
        let state = s2p_storage::read_json::<RecoveryState>(path)?.unwrap_or_default();
        Ok(Self {
            path: path.to_owned(),
            check_interval,
            state,
        })
    }

    fn save(&self) -> Result<(), RecoverySchedulerError> {
        s2p_storage::write_json(&self.path, &self.state)?;
        Ok(())
    }

    pub fn state(&self) -> RecoveryState {
        self.state.clone()
    }

    /// Whether a deep health probe is due: the gate is purely time-based,
    /// independent of breaker state, so callers can call this every loop
    /// iteration cheaply.
    pub fn should_check_recovery(&self, now_unix: u64) -> bool {
        now_unix.saturating_sub(self.state.last_check_time) >= self.check_interval.as_secs()
    }

    /// Record the outcome of a health probe taken because
    /// [`should_check_recovery`] returned true. Only forwarded to the
    /// breaker while `HALF_OPEN` — a probe result observed while `CLOSED`
    /// or fully `OPEN` is informational only.
    pub fn record_health_check(
        &mut self,
        now_unix: u64,
        success: bool,
        error_kind: Option<ErrorKind>,
        breaker: &mut CircuitBreaker,
        outage_history: &mut OutageHistory,
    ) -> Result<(), RecoverySchedulerError> {
        self.state.last_check_time = now_unix;

        if success {
            self.state.consecutive_successes += 1;
            self.state.consecutive_failures = 0;
        } else {
            self.state.consecutive_failures += 1;
            self.state.consecutive_successes = 0;
        }

        if breaker.state().state == BreakerStateKind::HalfOpen {
            let was_half_open = true;
            if success {
                breaker.record_success(now_unix, outage_history)?;
            } else {
                let kind = error_kind.unwrap_or(ErrorKind::ServerDown);
                breaker.record_failure(now_unix, kind, outage_history)?;
            }
            if was_half_open && breaker.state().state == BreakerStateKind::Closed {
                self.state.recovery_count += 1;
                self.state.last_recovery_time = Some(now_unix);
                info!(
                    recovery_count = self.state.recovery_count,
                    "recovery detected: Plex is healthy again, circuit breaker closed"
                );
            }
        }

        self.save()
    }
}
