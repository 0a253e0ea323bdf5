// SPDX-License-Identifier: MIT

//! Operational settings the worker and reconciliation engine consult.
//! Parsed from the host's TOML config by the `stash2plex` binary and
//! passed down as a plain struct — nothing here touches the filesystem.

use s2p_core::{Job, PathRewriteRule, ScenePayload};
use std::time::Duration;

/// Which `ScenePayload` fields this pipeline is allowed to write to Plex.
/// Mirrors the `sync_studio`, `sync_performers`, … boolean config keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldToggles {
    pub title: bool,
    pub details: bool,
    pub date: bool,
    pub studio: bool,
    pub performers: bool,
    pub tags: bool,
    pub artwork: bool,
}

impl Default for FieldToggles {
    fn default() -> Self {
        Self {
            title: true,
            details: true,
            date: true,
            studio: true,
            performers: true,
            tags: true,
            artwork: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub library_sections: Vec<String>,
    pub path_rewrite_rules: Vec<PathRewriteRule>,
    pub strict_matching: bool,
    pub preserve_plex_edits: bool,
    pub poll_interval: Duration,
    /// Overrides [`crate::backoff::retry_params`]'s `max_retries` for
    /// `Transient` and `NotFound` when set; `ServerDown` always stays
    /// unbounded regardless.
    pub max_retries_override: Option<u32>,
    pub trigger_plex_scan: bool,
    pub fields: FieldToggles,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            library_sections: Vec::new(),
            path_rewrite_rules: Vec::new(),
            strict_matching: false,
            preserve_plex_edits: false,
            poll_interval: Duration::from_secs(1),
            max_retries_override: None,
            trigger_plex_scan: true,
            fields: FieldToggles::default(),
        }
    }
}

/// Assemble a `Metadata` job from a scene's current fields, validating the
/// `path` invariant `Job::new` enforces.
pub fn build_metadata_job(
    scene_id: s2p_core::SceneId,
    payload: ScenePayload,
    now_unix: u64,
) -> Result<Job, s2p_core::JobValidationError> {
    Job::new(scene_id, s2p_core::UpdateKind::Metadata, payload, now_unix)
}
