// SPDX-License-Identifier: MIT

//! In-memory dedup index of scene ids already queued, rebuilt from the
//! durable queue at startup so a restart never loses the dedup guarantee
//! a crash-mid-write could otherwise undo.

use s2p_core::SceneId;
use s2p_storage::DurableQueue;
use std::collections::HashSet;

/// How long a just-completed row still suppresses a freshly fired hook for
/// the same scene. Separate from the startup rebuild below, which only
/// wants rows still actually pending — a hook handler, by contrast, wants
/// to drop a redundant re-fire for a scene it just finished syncing.
pub const HOOK_DEDUP_WINDOW_SEC: u64 = 300;

pub struct PendingSet {
    scene_ids: HashSet<i64>,
}

impl PendingSet {
    /// Rebuilt from currently pending/in-progress rows only
    /// (`completed_window_sec = 0`) — a completed row from a previous
    /// process lifetime is not still "pending" and must not suppress a
    /// legitimate new hook for the same scene.
    pub fn rebuild(queue: &DurableQueue, now_unix: u64) -> Self {
        Self {
            scene_ids: queue.queued_scene_ids(now_unix, 0),
        }
    }

    pub fn contains(&self, scene_id: SceneId) -> bool {
        self.scene_ids.contains(&scene_id.get())
    }

    pub fn insert(&mut self, scene_id: SceneId) {
        self.scene_ids.insert(scene_id.get());
    }

    pub fn remove(&mut self, scene_id: SceneId) {
        self.scene_ids.remove(&scene_id.get());
    }

    pub fn len(&self) -> usize {
        self.scene_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scene_ids.is_empty()
    }
}
