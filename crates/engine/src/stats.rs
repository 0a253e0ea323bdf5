// SPDX-License-Identifier: MIT

//! Persisted wrapper around [`s2p_core::Stats`]. Loaded once at worker
//! startup, mutated in memory on every job outcome, and written back as a
//! whole-snapshot replace after each mutation.

use s2p_core::{MatchConfidence, Stats};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StatsStoreError {
    #[error(transparent)]
    Store(#[from] s2p_storage::AtomicStoreError),
}

pub struct StatsStore {
    path: PathBuf,
    stats: Stats,
}

impl StatsStore {
    pub fn load(path: &Path) -> Result<Self, StatsStoreError> {
        let stats = s2p_storage::read_json::<Stats>(path)?.unwrap_or_default();
        Ok(Self {
            path: path.to_owned(),
            stats,
        })
    }

    fn save(&self) -> Result<(), StatsStoreError> {
        s2p_storage::write_json(&self.path, &self.stats)?;
        Ok(())
    }

    pub fn get(&self) -> Stats {
        self.stats
    }

    pub fn record_success(
        &mut self,
        processing_time_sec: u64,
        confidence: MatchConfidence,
    ) -> Result<(), StatsStoreError> {
        self.stats.record_success(processing_time_sec, confidence);
        self.save()
    }

    pub fn record_failure(&mut self, processing_time_sec: u64) -> Result<(), StatsStoreError> {
        self.stats.record_failure(processing_time_sec);
        self.save()
    }

    pub fn record_dlq(&mut self) -> Result<(), StatsStoreError> {
        self.stats.record_dlq();
        self.save()
    }

    pub fn record_skipped(&mut self, confidence: MatchConfidence) -> Result<(), StatsStoreError> {
        self.stats.record_skipped(confidence);
        self.save()
    }
}
