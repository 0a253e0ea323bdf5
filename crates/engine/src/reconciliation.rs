// SPDX-License-Identifier: MIT

//! Periodic gap-detection sweep between Stash and Plex. Produces the same
//! kind of `Metadata` jobs a hook would, but discovered by comparing the
//! two systems wholesale rather than reacting to a single mutation.

use crate::config::build_metadata_job;
use crate::sync_timestamps::SyncTimestamps;
use s2p_adapters::{PlexClient, PlexError, StashClient, StashError};
use s2p_core::{
    find_candidates, Candidate, GapKind, Job, JobValidationError, MatchOutcome, PathRewriteRule,
    ReconciliationScope, SceneId, ScenePayload,
};
use s2p_storage::{DurableQueue, QueueError};
use std::collections::HashMap;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum ReconciliationError {
    #[error(transparent)]
    Stash(#[from] StashError),
    #[error(transparent)]
    Plex(#[from] PlexError),
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Job(#[from] JobValidationError),
}

#[derive(Debug, Clone)]
pub struct ReconciliationConfig {
    pub library_sections: Vec<String>,
    pub path_rewrite_rules: Vec<PathRewriteRule>,
    /// Stash scenes are paged and processed in chunks of this size so
    /// memory stays flat across large libraries.
    pub batch_size: u32,
    /// Whether a Stash scene with no matching Plex item at all counts as
    /// a gap. Some Stash libraries are supersets of what is imported into
    /// Plex, so this defaults to enabled but is user-overridable.
    pub reconcile_missing: bool,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            library_sections: Vec::new(),
            path_rewrite_rules: Vec::new(),
            batch_size: 100,
            reconcile_missing: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationOutcome {
    pub scenes_checked: u64,
    pub enqueued: u64,
    pub skipped_queued: u64,
    pub skipped_no_metadata: u64,
    pub skipped_already_synced: u64,
    pub gaps_by_kind: HashMap<GapKind, u64>,
}

fn scope_cutoff(scope: ReconciliationScope, now_unix: i64) -> Option<i64> {
    match scope {
        ReconciliationScope::All => None,
        ReconciliationScope::Last24h => Some(now_unix - 86_400),
        ReconciliationScope::Last7Days => Some(now_unix - 7 * 86_400),
    }
}

/// Run one reconciliation sweep, enqueueing a `Metadata` job for every
/// detected, not-already-handled gap.
///
/// `queuedSceneIDs` is snapshotted once up front (per the spec's "skip if
/// already queued" rule) — a scene enqueued mid-sweep by a concurrent hook
/// is not re-checked against it, since hooks run in separate short-lived
/// processes and cannot observe this snapshot anyway.
pub async fn run<S: StashClient, P: PlexClient>(
    stash: &S,
    plex: &P,
    queue: &mut DurableQueue,
    sync_timestamps: &SyncTimestamps,
    config: &ReconciliationConfig,
    scope: ReconciliationScope,
    now_unix: u64,
) -> Result<ReconciliationOutcome, ReconciliationError> {
    let queued_scene_ids = queue.queued_scene_ids(now_unix, 86_400);
    let plex_parts: Vec<Candidate> = plex
        .list_parts(&config.library_sections)
        .await?
        .into_iter()
        .map(|p| Candidate {
            rating_key: p.rating_key,
            library_section: p.library_section,
            file_path: p.file_path,
        })
        .collect();

    let cutoff = scope_cutoff(scope, now_unix as i64);
    let mut outcome = ReconciliationOutcome::default();
    let mut after: Option<i64> = None;

    'paging: loop {
        let page = stash.list_scenes_page(after, config.batch_size).await?;
        if page.is_empty() {
            break;
        }
        let page_len = page.len();
        after = page.last().map(|s| s.scene_id.get());

        for scene in page {
            if let Some(cutoff) = cutoff {
                if scene.updated_at < cutoff {
                    break 'paging;
                }
            }
            outcome.scenes_checked += 1;

            if queued_scene_ids.contains(&scene.scene_id.get()) {
                outcome.skipped_queued += 1;
                continue;
            }
            if sync_timestamps.is_up_to_date(scene.scene_id, scene.updated_at) {
                outcome.skipped_already_synced += 1;
                continue;
            }
            if !scene.payload.has_meaningful_metadata() {
                outcome.skipped_no_metadata += 1;
                info!(
                    scene_id = %scene.scene_id,
                    "reconciliation: scene out of sync but has no meaningful metadata to write, skipping"
                );
                continue;
            }

            let path = match &scene.payload.path {
                Some(path) => path,
                None => {
                    outcome.skipped_no_metadata += 1;
                    continue;
                }
            };
            let matched = find_candidates(&plex_parts, path, &config.path_rewrite_rules);

            let gap_kind = match matched {
                Err(_not_found) => {
                    if !config.reconcile_missing {
                        continue;
                    }
                    GapKind::MissingInPlex
                }
                Ok(outcome_match) => classify_matched_gap(plex, &outcome_match).await?,
            };

            *outcome.gaps_by_kind.entry(gap_kind).or_insert(0) += 1;
            outcome.enqueued += 1;
            enqueue_repair(queue, &scene.payload, scene.scene_id, now_unix)?;
        }

        if page_len < config.batch_size as usize {
            break;
        }
    }

    Ok(outcome)
}

async fn classify_matched_gap<P: PlexClient>(
    plex: &P,
    outcome: &MatchOutcome,
) -> Result<GapKind, ReconciliationError> {
    let rating_key = match outcome {
        MatchOutcome::High(candidate) => &candidate.rating_key,
        MatchOutcome::Low(candidates) => &candidates[0].rating_key,
    };
    let fields = plex.get_current_fields(rating_key).await?;
    let is_empty = fields.studio.is_none()
        && fields.summary.is_none()
        && fields.performers.is_none()
        && fields.tags.is_none()
        && fields.originally_available_at.is_none();
    Ok(if is_empty {
        GapKind::EmptyInPlex
    } else {
        GapKind::StaleSync
    })
}

fn enqueue_repair(
    queue: &mut DurableQueue,
    payload: &ScenePayload,
    scene_id: SceneId,
    now_unix: u64,
) -> Result<(), ReconciliationError> {
    let job = build_metadata_job(scene_id, payload.clone(), now_unix)?;
    queue.enqueue(job, now_unix)?;
    Ok(())
}
