// SPDX-License-Identifier: MIT

//! Persisted recovery-scheduler bookkeeping.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryState {
    pub last_check_time: u64,
    pub consecutive_successes: u32,
    pub consecutive_failures: u32,
    pub last_recovery_time: Option<u64>,
    pub recovery_count: u64,
}

impl Default for RecoveryState {
    fn default() -> Self {
        Self {
            last_check_time: 0,
            consecutive_successes: 0,
            consecutive_failures: 0,
            last_recovery_time: None,
            recovery_count: 0,
        }
    }
}
