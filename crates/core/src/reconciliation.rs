//! Reconciliation run bookkeeping and gap classification.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// The three classes of metadata gap reconciliation looks for between
/// Stash and Plex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapKind {
    /// Plex has the item but no metadata has ever been written to it.
    EmptyInPlex,
    /// Metadata was written, but Stash has since been updated more
    /// recently than the last successful sync.
    StaleSync,
    /// No Plex item can be found for the scene's filename at all.
    MissingInPlex,
}

impl fmt::Display for GapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GapKind::EmptyInPlex => "empty_in_plex",
            GapKind::StaleSync => "stale_sync",
            GapKind::MissingInPlex => "missing_in_plex",
        })
    }
}

/// Scope of a reconciliation run, mirroring the `reconcile_scope` config
/// setting and the `reconcile_*` task-mode variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationScope {
    All,
    Last24h,
    Last7Days,
}

impl fmt::Display for ReconciliationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReconciliationScope::All => "all",
            ReconciliationScope::Last24h => "24h",
            ReconciliationScope::Last7Days => "7days",
        })
    }
}

/// Persisted outcome of the most recent reconciliation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationState {
    pub last_run_at: u64,
    pub last_scope: ReconciliationScope,
    pub scenes_checked: u64,
    pub gaps_by_kind: HashMap<GapKind, u64>,
    pub enqueued_count: u64,
    pub skipped_count: u64,
}

impl ReconciliationState {
    pub fn new(
        run_at: u64,
        scope: ReconciliationScope,
        scenes_checked: u64,
        gaps_by_kind: HashMap<GapKind, u64>,
        enqueued_count: u64,
        skipped_count: u64,
    ) -> Self {
        Self {
            last_run_at: run_at,
            last_scope: scope,
            scenes_checked,
            gaps_by_kind,
            enqueued_count,
            skipped_count,
        }
    }

    pub fn total_gaps(&self) -> u64 {
        self.gaps_by_kind.values().sum()
    }
}
