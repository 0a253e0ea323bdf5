// SPDX-License-Identifier: MIT

//! Resolves the plugin data directory and the fixed on-disk layout under it
//! (§6's file list) into concrete paths the rest of the binary opens.

use std::path::{Path, PathBuf};

/// Every persisted file/directory this pipeline owns, rooted at one data
/// directory (by default the Stash plugin's own data dir).
#[derive(Debug, Clone)]
pub struct DataPaths {
    root: PathBuf,
}

impl DataPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn queue(&self) -> PathBuf {
        self.root.join("queue").join("queue.jsonl")
    }

    pub fn dlq(&self) -> PathBuf {
        self.root.join("dlq").join("dlq.jsonl")
    }

    pub fn circuit_breaker(&self) -> PathBuf {
        self.root.join("circuit_breaker.json")
    }

    pub fn outage_history(&self) -> PathBuf {
        self.root.join("outage_history.json")
    }

    pub fn recovery_state(&self) -> PathBuf {
        self.root.join("recovery_state.json")
    }

    pub fn reconciliation_state(&self) -> PathBuf {
        self.root.join("reconciliation_state.json")
    }

    pub fn sync_timestamps(&self) -> PathBuf {
        self.root.join("sync_timestamps.json")
    }

    pub fn stats(&self) -> PathBuf {
        self.root.join("stats.json")
    }

    pub fn device_identity(&self) -> PathBuf {
        self.root.join("device_identity")
    }

    pub fn worker_lock(&self) -> PathBuf {
        self.root.join("worker.lock")
    }
}
