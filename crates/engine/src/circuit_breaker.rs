// SPDX-License-Identifier: MIT

//! Three-state circuit breaker, persisted on every transition.
//!
//! This is the sole writer of [`BreakerState`] — the worker loop is the
//! only caller permitted to construct one for mutation. Diagnostics
//! (hook handlers, the `health_check`/`outage_summary` task modes) should
//! read the persisted state file directly rather than constructing a
//! [`CircuitBreaker`] of their own, to keep the single-writer invariant
//! enforced by convention rather than by locking.

use crate::outage_history::OutageHistory;
use s2p_core::{BreakerState, BreakerStateKind, ErrorKind};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub recovery_timeout_sec: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 1,
            recovery_timeout_sec: 60,
        }
    }
}

#[derive(Debug, Error)]
pub enum BreakerError {
    #[error(transparent)]
    Store(#[from] s2p_storage::AtomicStoreError),
    #[error(transparent)]
    OutageHistory(#[from] crate::outage_history::OutageHistoryError),
}

pub struct CircuitBreaker {
    path: PathBuf,
    config: BreakerConfig,
    state: BreakerState,
}

impl CircuitBreaker {
    pub fn load(path: &Path, config: BreakerConfig) -> Result<Self, BreakerError> {
        let state = s2p_storage::read_json::<BreakerState>(path)?.unwrap_or_default();
        Ok(Self {
            path: path.to_owned(),
            config,
            state,
        })
    }

    fn save(&self) -> Result<(), BreakerError> {
        s2p_storage::write_json(&self.path, &self.state)?;
        Ok(())
    }

    pub fn state(&self) -> BreakerState {
        self.state.clone()
    }

    /// Read-only query: is OPEN, lazily self-transitioning to HALF_OPEN
    /// once `recovery_timeout_sec` has elapsed. This mutates persisted
    /// state (the lazy transition), so it must only be called by the
    /// worker.
    pub fn can_execute(&mut self, now_unix: u64) -> Result<bool, BreakerError> {
        match self.state.state {
            BreakerStateKind::Closed => Ok(true),
            BreakerStateKind::HalfOpen => Ok(false),
            BreakerStateKind::Open => {
                let opened_at = self.state.opened_at.unwrap_or(now_unix);
                if now_unix.saturating_sub(opened_at) >= self.config.recovery_timeout_sec {
                    self.state.state = BreakerStateKind::HalfOpen;
                    self.save()?;
                    info!("circuit breaker: OPEN -> HALF_OPEN, recovery timeout elapsed, permitting one probe");
                    Ok(false)
                } else {
                    Ok(false)
                }
            }
        }
    }

    /// Record a success. In `HalfOpen`, `success_threshold` consecutive
    /// successes close the breaker and end the open outage record.
    pub fn record_success(
        &mut self,
        now_unix: u64,
        outage_history: &mut OutageHistory,
    ) -> Result<(), BreakerError> {
        match self.state.state {
            BreakerStateKind::Closed => {
                self.state.consecutive_failures = 0;
            }
            BreakerStateKind::HalfOpen => {
                self.state.consecutive_successes += 1;
                if self.state.consecutive_successes >= self.config.success_threshold {
                    self.state = BreakerState {
                        state: BreakerStateKind::Closed,
                        consecutive_failures: 0,
                        consecutive_successes: 0,
                        opened_at: None,
                    };
                    outage_history.close_open(now_unix)?;
                    info!("circuit breaker: HALF_OPEN -> CLOSED, Plex recovered");
                }
            }
            BreakerStateKind::Open => {
                // A success cannot be observed while fully OPEN — callers
                // gate writes behind `can_execute`. Ignore defensively.
            }
        }
        self.save()?;
        Ok(())
    }

    /// Record a failure. In `Closed`, `failure_threshold` consecutive
    /// failures opens the breaker and starts a new outage record. In
    /// `HalfOpen`, any failure reopens it — resetting `opened_at` so the
    /// next recovery-timeout window starts over.
    pub fn record_failure(
        &mut self,
        now_unix: u64,
        error_kind: ErrorKind,
        outage_history: &mut OutageHistory,
    ) -> Result<(), BreakerError> {
        match self.state.state {
            BreakerStateKind::Closed => {
                self.state.consecutive_failures += 1;
                if self.state.consecutive_failures >= self.config.failure_threshold {
                    self.state = BreakerState {
                        state: BreakerStateKind::Open,
                        consecutive_failures: self.state.consecutive_failures,
                        consecutive_successes: 0,
                        opened_at: Some(now_unix),
                    };
                    outage_history.open(now_unix, error_kind)?;
                    info!(
                        failures = self.state.consecutive_failures,
                        "circuit breaker: CLOSED -> OPEN, failure threshold reached"
                    );
                }
            }
            BreakerStateKind::HalfOpen => {
                self.state.state = BreakerStateKind::Open;
                self.state.opened_at = Some(now_unix);
                self.state.consecutive_successes = 0;
                info!("circuit breaker: HALF_OPEN -> OPEN, probe failed, recovery timeout restarts");
            }
            BreakerStateKind::Open => {
                // Already open; nothing to do beyond keeping the counter
                // informative for diagnostics.
                self.state.consecutive_failures = self.state.consecutive_failures.saturating_add(1);
            }
        }
        self.save()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh(dir: &tempfile::TempDir) -> (CircuitBreaker, OutageHistory) {
        let breaker = CircuitBreaker::load(&dir.path().join("breaker.json"), BreakerConfig::default()).unwrap();
        let history = OutageHistory::load(&dir.path().join("outage_history.json")).unwrap();
        (breaker, history)
    }

    #[test]
    fn closed_breaker_permits_execution() {
        let dir = tempfile::tempdir().unwrap();
        let (mut breaker, _history) = fresh(&dir);
        assert!(breaker.can_execute(0).unwrap());
    }

    #[test]
    fn failure_threshold_opens_breaker_and_opens_outage_record() {
        let dir = tempfile::tempdir().unwrap();
        let (mut breaker, mut history) = fresh(&dir);
        for _ in 0..5 {
            breaker.record_failure(100, ErrorKind::ServerDown, &mut history).unwrap();
        }
        assert_eq!(breaker.state().state, BreakerStateKind::Open);
        assert_eq!(history.records().len(), 1);
        assert!(history.records()[0].is_open());
    }

    #[test]
    fn success_resets_failure_counter_in_closed_state() {
        let dir = tempfile::tempdir().unwrap();
        let (mut breaker, mut history) = fresh(&dir);
        breaker.record_failure(100, ErrorKind::ServerDown, &mut history).unwrap();
        breaker.record_failure(100, ErrorKind::ServerDown, &mut history).unwrap();
        breaker.record_success(100, &mut history).unwrap();
        assert_eq!(breaker.state().consecutive_failures, 0);
    }

    #[test]
    fn open_lazily_transitions_to_half_open_after_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let (mut breaker, mut history) = fresh(&dir);
        for _ in 0..5 {
            breaker.record_failure(0, ErrorKind::ServerDown, &mut history).unwrap();
        }
        assert!(!breaker.can_execute(30).unwrap());
        assert_eq!(breaker.state().state, BreakerStateKind::Open);

        assert!(!breaker.can_execute(60).unwrap());
        assert_eq!(breaker.state().state, BreakerStateKind::HalfOpen);
    }

    #[test]
    fn half_open_success_closes_breaker_and_ends_outage() {
        let dir = tempfile::tempdir().unwrap();
        let (mut breaker, mut history) = fresh(&dir);
        for _ in 0..5 {
            breaker.record_failure(0, ErrorKind::ServerDown, &mut history).unwrap();
        }
        breaker.can_execute(60).unwrap();
        breaker.record_success(65, &mut history).unwrap();
        assert_eq!(breaker.state().state, BreakerStateKind::Closed);
        assert!(!history.records()[0].is_open());
        assert_eq!(history.records()[0].duration_sec, Some(65));
    }

    #[test]
    fn half_open_failure_reopens_and_resets_opened_at() {
        let dir = tempfile::tempdir().unwrap();
        let (mut breaker, mut history) = fresh(&dir);
        for _ in 0..5 {
            breaker.record_failure(0, ErrorKind::ServerDown, &mut history).unwrap();
        }
        breaker.can_execute(60).unwrap();
        breaker.record_failure(61, ErrorKind::ServerDown, &mut history).unwrap();
        assert_eq!(breaker.state().state, BreakerStateKind::Open);
        assert_eq!(breaker.state().opened_at, Some(61));

        // The next recovery window is measured from the new opened_at
        // (61), not the original (0): at t=90 (29s later) it must still
        // be closed to probing.
        assert!(!breaker.can_execute(90).unwrap());
        assert_eq!(breaker.state().state, BreakerStateKind::Open);
    }
}
