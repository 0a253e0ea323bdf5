// SPDX-License-Identifier: MIT

//! `{sceneID -> unixSeconds}` of the last successful sync per scene,
//! written atomically on every success and consulted by reconciliation's
//! "sync-timestamp wins" guard.

use s2p_core::SceneId;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncTimestampsError {
    #[error(transparent)]
    Store(#[from] s2p_storage::AtomicStoreError),
}

pub struct SyncTimestamps {
    path: PathBuf,
    map: HashMap<i64, i64>,
}

impl SyncTimestamps {
    pub fn load(path: &Path) -> Result<Self, SyncTimestampsError> {
        let map = s2p_storage::read_json::<HashMap<i64, i64>>(path)?.unwrap_or_default();
        Ok(Self {
            path: path.to_owned(),
            map,
        })
    }

    fn save(&self) -> Result<(), SyncTimestampsError> {
        s2p_storage::write_json(&self.path, &self.map)?;
        Ok(())
    }

    pub fn get(&self, scene_id: SceneId) -> Option<i64> {
        self.map.get(&scene_id.get()).copied()
    }

    pub fn record(&mut self, scene_id: SceneId, now_unix: i64) -> Result<(), SyncTimestampsError> {
        self.map.insert(scene_id.get(), now_unix);
        self.save()
    }

    /// True if a prior sync exists at or after `updated_at` — the guard
    /// that prevents reconciliation from re-enqueuing a scene that is
    /// already in sync, regardless of what the downstream view currently
    /// shows.
    pub fn is_up_to_date(&self, scene_id: SceneId, updated_at: i64) -> bool {
        self.get(scene_id).is_some_and(|synced_at| synced_at >= updated_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync_timestamps.json");
        {
            let mut store = SyncTimestamps::load(&path).unwrap();
            store.record(SceneId::new(42).unwrap(), 1000).unwrap();
        }
        let reopened = SyncTimestamps::load(&path).unwrap();
        assert_eq!(reopened.get(SceneId::new(42).unwrap()), Some(1000));
    }

    #[test]
    fn is_up_to_date_requires_sync_at_or_after_update() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SyncTimestamps::load(&dir.path().join("sync_timestamps.json")).unwrap();
        let id = SceneId::new(42).unwrap();
        assert!(!store.is_up_to_date(id, 1000));
        store.record(id, 1000).unwrap();
        assert!(store.is_up_to_date(id, 1000));
        assert!(store.is_up_to_date(id, 500));
        assert!(!store.is_up_to_date(id, 1500));
    }
}
