// SPDX-License-Identifier: MIT

//! Hook-event handling: Stash fires `Scene.Update.Post`, `Scene.Create.Post`,
//! and `Scene.Destroy.Post` as separate short-lived plugin invocations, so
//! every call here opens its own queue and checks its own dedup state
//! rather than sharing anything with a running worker process.

use crate::config::Config;
use crate::envelope::{HookContext, HookType};
use anyhow::Context;
use s2p_adapters::{HttpStashClient, StashClient};
use s2p_core::{Job, SceneId, UpdateKind};
use s2p_engine::{build_metadata_job, HOOK_DEDUP_WINDOW_SEC};
use s2p_storage::{DurableQueue, WorkerLock};
use std::time::{SystemTime, UNIX_EPOCH};

fn now_unix() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

pub async fn handle(hook_context: &HookContext, config: &Config) -> anyhow::Result<()> {
    if hook_context.touches_only_ignored_fields() {
        tracing::debug!("hook fired for play-count/view-history fields only, skipping");
        return Ok(());
    }

    let Some(raw_id) = hook_context.scene_id_raw() else {
        tracing::warn!("hook payload carried no scene id, skipping");
        return Ok(());
    };
    let scene_id = SceneId::new(raw_id).context("invalid scene id in hook payload")?;

    let paths = crate::paths::DataPaths::new(config.data_dir.clone());
    // The durable queue forbids unsynchronized concurrent writers; a hook
    // invocation is no exception even though it only ever appends one row.
    let _lock = WorkerLock::try_acquire(&paths.worker_lock()).context("acquire worker lock")?;
    let now = now_unix();

    let mut queue = DurableQueue::open(&paths.queue()).context("open queue")?;
    // Covers both dedup concerns in one query: rows still pending/in-progress
    // (regardless of age) and rows completed within the last
    // HOOK_DEDUP_WINDOW_SEC, so a redundant re-fire for a scene this same
    // plugin just finished syncing doesn't enqueue a second job.
    if queue.queued_scene_ids(now, HOOK_DEDUP_WINDOW_SEC).contains(&scene_id.get()) {
        tracing::debug!(scene_id = %scene_id, "scene already queued or recently synced, skipping duplicate hook");
        return Ok(());
    }

    let job = match hook_context.hook_type {
        HookType::SceneDestroyPost => Job::new(scene_id, UpdateKind::Delete, Default::default(), now)?,
        HookType::SceneUpdatePost | HookType::SceneCreatePost => {
            // The hook's `input` only carries the fields that changed, not
            // the full scene (and never the file path `Metadata` jobs
            // require), so the fresh scene must be re-fetched from Stash.
            let stash = HttpStashClient::new(config.stash_url.clone(), config.stash_api_key.clone())?;
            let scene = stash.get_scene(scene_id).await.context("fetch scene for hook")?;
            build_metadata_job(scene_id, scene.payload, now)?
        }
    };

    queue.enqueue(job, now)?;
    tracing::info!(scene_id = %scene_id, hook = ?hook_context.hook_type, "enqueued job from hook event");
    Ok(())
}
