// SPDX-License-Identifier: MIT

//! Gates automatic reconciliation sweeps to the configured interval and
//! persists the outcome of the last run for `outage-summary`/`view-status`
//! reporting.

use s2p_core::{GapKind, ReconciliationScope, ReconciliationState};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconciliationSchedulerError {
    #[error(transparent)]
    Store(#[from] s2p_storage::AtomicStoreError),
}

/// How often an automatic sweep runs. `Never` disables the scheduler
/// entirely — reconciliation only happens via an explicit task-mode
/// invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileInterval {
    Never,
    Hourly,
    Daily,
    Weekly,
}

impl ReconcileInterval {
    fn as_secs(self) -> Option<u64> {
        match self {
            ReconcileInterval::Never => None,
            ReconcileInterval::Hourly => Some(3_600),
            ReconcileInterval::Daily => Some(86_400),
            ReconcileInterval::Weekly => Some(7 * 86_400),
        }
    }
}

pub struct ReconciliationScheduler {
    path: PathBuf,
    interval: ReconcileInterval,
    scope: ReconciliationScope,
    state: Option<ReconciliationState>,
}

impl ReconciliationScheduler {
    pub fn load(
        path: &Path,
        interval: ReconcileInterval,
        scope: ReconciliationScope,
    ) -> Result<Self, ReconciliationSchedulerError> {
        let state = s2p_storage::read_json::<ReconciliationState>(path)?;
        Ok(Self {
            path: path.to_owned(),
            interval,
            scope,
            state,
        })
    }

    fn save(&self) -> Result<(), ReconciliationSchedulerError> {
        if let Some(state) = &self.state {
            s2p_storage::write_json(&self.path, state)?;
        }
        Ok(())
    }

    pub fn last_state(&self) -> Option<&ReconciliationState> {
        self.state.as_ref()
    }

    /// True if an automatic sweep is due: `interval != Never` and either no
    /// run has ever completed, or enough time has elapsed since the last
    /// one finished.
    pub fn is_due(&self, now_unix: u64) -> bool {
        let Some(interval_secs) = self.interval.as_secs() else {
            return false;
        };
        match &self.state {
            None => true,
            Some(state) => now_unix.saturating_sub(state.last_run_at) >= interval_secs,
        }
    }

    pub fn scope(&self) -> ReconciliationScope {
        self.scope
    }

    /// Record a completed sweep's outcome, whether it came from the
    /// scheduler or a manually invoked task mode.
    pub fn record_run(
        &mut self,
        run_at: u64,
        scope: ReconciliationScope,
        scenes_checked: u64,
        gaps_by_kind: HashMap<GapKind, u64>,
        enqueued_count: u64,
        skipped_count: u64,
    ) -> Result<(), ReconciliationSchedulerError> {
        self.state = Some(ReconciliationState::new(
            run_at,
            scope,
            scenes_checked,
            gaps_by_kind,
            enqueued_count,
            skipped_count,
        ));
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler(dir: &tempfile::TempDir, interval: ReconcileInterval) -> ReconciliationScheduler {
        ReconciliationScheduler::load(
            &dir.path().join("reconciliation_state.json"),
            interval,
            ReconciliationScope::All,
        )
        .unwrap()
    }

    #[test]
    fn never_interval_is_never_due() {
        let dir = tempfile::tempdir().unwrap();
        let sched = scheduler(&dir, ReconcileInterval::Never);
        assert!(!sched.is_due(1_000_000));
    }

    #[test]
    fn due_immediately_when_no_prior_run_exists() {
        let dir = tempfile::tempdir().unwrap();
        let sched = scheduler(&dir, ReconcileInterval::Daily);
        assert!(sched.is_due(0));
    }

    #[test]
    fn not_due_until_interval_elapses() {
        let dir = tempfile::tempdir().unwrap();
        let mut sched = scheduler(&dir, ReconcileInterval::Hourly);
        sched
            .record_run(1000, ReconciliationScope::All, 50, HashMap::new(), 3, 47)
            .unwrap();
        assert!(!sched.is_due(1000 + 3_599));
        assert!(sched.is_due(1000 + 3_600));
    }

    #[test]
    fn state_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reconciliation_state.json");
        {
            let mut sched =
                ReconciliationScheduler::load(&path, ReconcileInterval::Daily, ReconciliationScope::Last24h)
                    .unwrap();
            let mut gaps = HashMap::new();
            gaps.insert(GapKind::StaleSync, 4);
            sched
                .record_run(500, ReconciliationScope::Last24h, 10, gaps, 4, 6)
                .unwrap();
        }
        let reopened =
            ReconciliationScheduler::load(&path, ReconcileInterval::Daily, ReconciliationScope::Last24h)
                .unwrap();
        let state = reopened.last_state().unwrap();
        assert_eq!(state.last_run_at, 500);
        assert_eq!(state.total_gaps(), 4);
    }
}
