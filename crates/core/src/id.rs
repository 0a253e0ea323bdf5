// SPDX-License-Identifier: MIT

//! Identifier newtypes.
//!
//! `JobId` and `SceneId` wrap raw integers so a scene ID can never be
//! accidentally passed where a job ID is expected, or vice versa.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Monotonically assigned identifier for a queued job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobId(pub u64);

impl JobId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the Stash scene a job targets.
///
/// Invariant: `sceneID > 0`. Construction through
/// [`SceneId::new`] enforces this; the inner value is otherwise a plain
/// `i64` because it is assigned by Stash, not by this pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SceneId(i64);

impl SceneId {
    pub fn new(value: i64) -> Result<Self, InvalidSceneId> {
        if value > 0 {
            Ok(Self(value))
        } else {
            Err(InvalidSceneId(value))
        }
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error returned when constructing a [`SceneId`] from a non-positive value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("scene id must be positive, got {0}")]
pub struct InvalidSceneId(i64);
