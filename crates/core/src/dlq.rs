// SPDX-License-Identifier: MIT

//! Dead-letter entry.

use crate::id::{JobId, SceneId};
use crate::job::Job;
use serde::{Deserialize, Serialize};

/// A terminally-failed job, retained for inspection or replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqEntry {
    pub id: u64,
    pub scene_id: SceneId,
    pub job_id: JobId,
    pub serialized_job: Job,
    pub error_kind_name: String,
    pub error_message: String,
    pub retry_count_at_failure: u32,
    pub failed_at: u64,
}
