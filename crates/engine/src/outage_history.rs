// SPDX-License-Identifier: MIT

//! Append-only outage history, persisted as a JSON array and mutated only
//! by the circuit breaker.

use s2p_core::{mtbf, mttr, ErrorKind, OutageRecord};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum OutageHistoryError {
    #[error(transparent)]
    Store(#[from] s2p_storage::AtomicStoreError),
}

pub struct OutageHistory {
    path: PathBuf,
    records: Vec<OutageRecord>,
}

impl OutageHistory {
    pub fn load(path: &Path) -> Result<Self, OutageHistoryError> {
        let records = s2p_storage::read_json::<Vec<OutageRecord>>(path)?.unwrap_or_default();
        Ok(Self {
            path: path.to_owned(),
            records,
        })
    }

    fn save(&self) -> Result<(), OutageHistoryError> {
        s2p_storage::write_json(&self.path, &self.records)?;
        Ok(())
    }

    /// Open a new outage record. Called when the breaker transitions to
    /// `OPEN`.
    pub fn open(&mut self, started_at: u64, first_error_kind: ErrorKind) -> Result<(), OutageHistoryError> {
        self.records.push(OutageRecord::open(started_at, first_error_kind));
        self.save()
    }

    /// Close the most recent open record. Called when the breaker
    /// transitions to `CLOSED` from `HALF_OPEN`.
    pub fn close_open(&mut self, ended_at: u64) -> Result<(), OutageHistoryError> {
        match self.records.iter_mut().rev().find(|r| r.is_open()) {
            Some(record) => record.close(ended_at),
            None => warn!("breaker closed but no open outage record found to close"),
        }
        self.save()
    }

    pub fn records(&self) -> &[OutageRecord] {
        &self.records
    }

    pub fn mttr(&self) -> Option<f64> {
        mttr(&self.records)
    }

    pub fn mtbf(&self) -> Option<f64> {
        mtbf(&self.records)
    }

    /// Records that are still open even though the breaker is currently
    /// `CLOSED` — displayed as "resolved, breaker closed" without being
    /// modified, per the outage-summary report.
    pub fn orphaned<'a>(&'a self, breaker_is_closed: bool) -> Vec<&'a OutageRecord> {
        if !breaker_is_closed {
            return Vec::new();
        }
        self.records.iter().filter(|r| r.is_open()).collect()
    }
}
