// SPDX-License-Identifier: MIT

//! Append-only dead-letter store, indexed by scene id, failure time, and
//! error kind for the `view_status`/`outage_summary` task-mode reports.

use s2p_core::{DlqEntry, ErrorKind, Job, JobId, SceneId};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum DlqError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no dead-letter entry with id {0}")]
    UnknownEntry(u64),
}

/// JSONL-backed dead-letter log with in-memory indexes rebuilt on open.
pub struct DlqStore {
    file: File,
    path: PathBuf,
    entries: BTreeMap<u64, DlqEntry>,
    next_id: u64,
}

impl DlqStore {
    pub fn open(path: &Path) -> Result<Self, DlqError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        let entries = Self::replay_log(&file)?;
        let next_id = entries.keys().max().copied().unwrap_or(0) + 1;

        Ok(Self {
            file,
            path: path.to_owned(),
            entries,
            next_id,
        })
    }

    fn replay_log(file: &File) -> Result<BTreeMap<u64, DlqEntry>, DlqError> {
        let mut reader = BufReader::new(file.try_clone()?);
        let mut entries = BTreeMap::new();
        let mut line = String::new();
        loop {
            line.clear();
            match reader.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::InvalidData => break,
                Err(e) => return Err(e.into()),
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<DlqRecord>(trimmed) {
                Ok(DlqRecord::Add(entry)) => {
                    entries.insert(entry.id, entry);
                }
                Ok(DlqRecord::Delete { id }) => {
                    entries.remove(&id);
                }
                Err(e) => {
                    warn!(error = %e, "corrupt dead-letter log entry, stopping replay");
                    break;
                }
            }
        }
        Ok(entries)
    }

    fn append(&mut self, record: &DlqRecord) -> Result<(), DlqError> {
        let mut bytes = serde_json::to_vec(record)?;
        bytes.push(b'\n');
        self.file.write_all(&bytes)?;
        self.file.sync_all()?;
        Ok(())
    }

    /// Append an entry for the given job, returning its assigned id.
    pub fn add(
        &mut self,
        scene_id: SceneId,
        job_id: JobId,
        serialized_job: Job,
        error_kind: ErrorKind,
        error_message: String,
        retry_count_at_failure: u32,
        failed_at: u64,
    ) -> Result<u64, DlqError> {
        let id = self.next_id;
        self.next_id += 1;
        let entry = DlqEntry {
            id,
            scene_id,
            job_id,
            serialized_job,
            error_kind_name: error_kind.name().to_string(),
            error_message,
            retry_count_at_failure,
            failed_at,
        };
        self.append(&DlqRecord::Add(entry.clone()))?;
        self.entries.insert(id, entry);
        Ok(id)
    }

    /// Most recent `limit` entries, newest `failed_at` first.
    pub fn get_recent(&self, limit: usize) -> Vec<&DlqEntry> {
        let mut entries: Vec<&DlqEntry> = self.entries.values().collect();
        entries.sort_by(|a, b| b.failed_at.cmp(&a.failed_at));
        entries.truncate(limit);
        entries
    }

    pub fn get_by_id(&self, id: u64) -> Option<&DlqEntry> {
        self.entries.get(&id)
    }

    /// Delete entries with `failed_at` older than `now - seconds`. Returns
    /// how many were removed.
    pub fn delete_older_than(&mut self, now_unix: u64, seconds: u64) -> Result<usize, DlqError> {
        let cutoff = now_unix.saturating_sub(seconds);
        let stale: Vec<u64> = self
            .entries
            .values()
            .filter(|e| e.failed_at < cutoff)
            .map(|e| e.id)
            .collect();
        for id in &stale {
            self.append(&DlqRecord::Delete { id: *id })?;
            self.entries.remove(id);
        }
        Ok(stale.len())
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn clear(&mut self) -> Result<(), DlqError> {
        let ids: Vec<u64> = self.entries.keys().copied().collect();
        for id in ids {
            self.append(&DlqRecord::Delete { id })?;
            self.entries.remove(&id);
        }
        Ok(())
    }

    /// Remove and return the serialized job for `id`, for the caller to
    /// re-enqueue. The entry is deleted as part of replay, matching
    /// "copy into queue, then delete" semantics.
    pub fn replay(&mut self, id: u64) -> Result<Job, DlqError> {
        let entry = self
            .entries
            .get(&id)
            .cloned()
            .ok_or(DlqError::UnknownEntry(id))?;
        self.append(&DlqRecord::Delete { id })?;
        self.entries.remove(&id);
        Ok(entry.serialized_job)
    }

    pub fn entries_by_scene(&self, scene_id: SceneId) -> Vec<&DlqEntry> {
        self.entries
            .values()
            .filter(|e| e.scene_id == scene_id)
            .collect()
    }

    pub fn entries_by_error_kind<'a>(&'a self, kind_name: &str) -> Vec<&'a DlqEntry> {
        self.entries
            .values()
            .filter(|e| e.error_kind_name == kind_name)
            .collect()
    }

    /// Rewrite the log with only current entries, collapsing tombstoned
    /// deletes. Bounds log growth.
    pub fn compact(&mut self) -> Result<(), DlqError> {
        let tmp_path = self.path.with_extension("tmp");
        {
            let mut tmp = File::create(&tmp_path)?;
            for entry in self.entries.values() {
                let mut bytes = serde_json::to_vec(&DlqRecord::Add(entry.clone()))?;
                bytes.push(b'\n');
                tmp.write_all(&bytes)?;
            }
            tmp.sync_all()?;
        }
        std::fs::rename(&tmp_path, &self.path)?;
        self.file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;
        Ok(())
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind")]
enum DlqRecord {
    Add(DlqEntry),
    Delete { id: u64 },
}
