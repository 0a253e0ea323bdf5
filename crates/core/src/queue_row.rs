// SPDX-License-Identifier: MIT

//! Queue row envelope.

use crate::id::JobId;
use crate::job::Job;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a queue row. Only [`RowStatus::Pending`] rows are
/// dequeuable; `IN_PROGRESS` rows surviving a restart must be resumed to
/// `Pending` before the first dequeue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowStatus {
    Pending,
    InProgress,
    Acked,
    Nacked,
    Failed,
    Completed,
}

impl RowStatus {
    pub fn is_dequeuable(self) -> bool {
        matches!(self, RowStatus::Pending)
    }
}

/// A job's storage envelope, as persisted by the durable queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueRow {
    pub job_id: JobId,
    pub job: Job,
    pub status: RowStatus,
    /// Set at enqueue and never mutated afterward; used by
    /// `queuedSceneIDs(completedWindowSec)` to bound how long a `Completed`
    /// row still blocks dedup.
    pub row_timestamp: u64,
}

impl QueueRow {
    pub fn new(job_id: JobId, job: Job, row_timestamp: u64) -> Self {
        Self {
            job_id,
            job,
            status: RowStatus::Pending,
            row_timestamp,
        }
    }
}
