// SPDX-License-Identifier: MIT

//! Job identity and payload.

use crate::error_kind::ErrorKind;
use crate::id::SceneId;
use serde::{Deserialize, Serialize};

/// What kind of Plex write a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    Metadata,
    Delete,
    Scan,
}

/// The validated metadata bundle carried by a `metadata` job.
///
/// `path` is required when `update_kind == Metadata`;
/// enforced by [`Job::new`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenePayload {
    pub title: Option<String>,
    pub details: Option<String>,
    pub date: Option<String>,
    pub rating100: Option<u32>,
    pub studio: Option<String>,
    #[serde(default)]
    pub performers: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub path: Option<String>,
    pub poster_url: Option<String>,
    pub background_url: Option<String>,
    pub stash_updated_at: Option<i64>,
}

impl ScenePayload {
    /// True if at least one field Stash considers "meaningful" is set
    /// `rating100` is intentionally excluded — a rating change alone is not
    /// treated as a reconciliation-worthy gap.
    pub fn has_meaningful_metadata(&self) -> bool {
        self.studio.is_some()
            || !self.performers.is_empty()
            || !self.tags.is_empty()
            || self.details.as_ref().is_some_and(|d| !d.is_empty())
            || self.date.is_some()
    }
}

/// Error returned by [`Job::new`] when the payload violates one of the
/// invariants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobValidationError {
    #[error("metadata job requires payload.path")]
    MissingPath,
}

/// A single sync request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub scene_id: SceneId,
    pub update_kind: UpdateKind,
    pub payload: ScenePayload,
    pub enqueued_at: u64,
    #[serde(default)]
    pub retry_count: u32,
    /// Consecutive `ServerDown` failures. Tracked separately from
    /// `retry_count` — a `ServerDown` failure reflects Plex being
    /// unreachable, not the job itself, so it never counts toward a
    /// kind's retry-exhaustion limit.
    #[serde(default)]
    pub server_down_count: u32,
    pub next_retry_at: Option<u64>,
    pub last_error_kind: Option<ErrorKind>,
}

impl Job {
    /// Construct a new job, validating its invariants.
    ///
    /// `enqueued_at` is the caller's wall-clock time (unix seconds); passed
    /// in rather than read here so the durable queue can stamp every row
    /// (including retries) from a single clock call.
    pub fn new(
        scene_id: SceneId,
        update_kind: UpdateKind,
        payload: ScenePayload,
        enqueued_at: u64,
    ) -> Result<Self, JobValidationError> {
        if update_kind == UpdateKind::Metadata && payload.path.is_none() {
            return Err(JobValidationError::MissingPath);
        }
        Ok(Self {
            scene_id,
            update_kind,
            payload,
            enqueued_at,
            retry_count: 0,
            server_down_count: 0,
            next_retry_at: None,
            last_error_kind: None,
        })
    }

    /// True once `next_retry_at` has elapsed (or was never set).
    pub fn is_ready_for_retry(&self, now_unix: u64) -> bool {
        self.next_retry_at.is_none_or(|at| at <= now_unix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene(id: i64) -> SceneId {
        SceneId::new(id).unwrap()
    }

    #[test]
    fn metadata_job_requires_path() {
        let payload = ScenePayload {
            title: Some("T".into()),
            ..Default::default()
        };
        let err = Job::new(scene(1), UpdateKind::Metadata, payload, 100).unwrap_err();
        assert_eq!(err, JobValidationError::MissingPath);
    }

    #[test]
    fn metadata_job_with_path_is_valid() {
        let payload = ScenePayload {
            path: Some("/m/a.mp4".into()),
            ..Default::default()
        };
        let job = Job::new(scene(1), UpdateKind::Metadata, payload, 100).unwrap();
        assert_eq!(job.retry_count, 0);
        assert!(job.next_retry_at.is_none());
    }

    #[test]
    fn delete_and_scan_jobs_do_not_require_path() {
        assert!(Job::new(scene(1), UpdateKind::Delete, ScenePayload::default(), 100).is_ok());
        assert!(Job::new(scene(1), UpdateKind::Scan, ScenePayload::default(), 100).is_ok());
    }

    #[test]
    fn ready_for_retry_without_next_retry_at() {
        let job = Job::new(scene(1), UpdateKind::Scan, ScenePayload::default(), 100).unwrap();
        assert!(job.is_ready_for_retry(100));
    }

    #[test]
    fn not_ready_until_next_retry_at_elapses() {
        let mut job = Job::new(scene(1), UpdateKind::Scan, ScenePayload::default(), 100).unwrap();
        job.next_retry_at = Some(200);
        assert!(!job.is_ready_for_retry(150));
        assert!(job.is_ready_for_retry(200));
        assert!(job.is_ready_for_retry(250));
    }

    #[test]
    fn meaningful_metadata_excludes_rating_alone() {
        let payload = ScenePayload {
            rating100: Some(80),
            ..Default::default()
        };
        assert!(!payload.has_meaningful_metadata());

        let payload = ScenePayload {
            rating100: Some(80),
            studio: Some("S".into()),
            ..Default::default()
        };
        assert!(payload.has_meaningful_metadata());
    }
}
