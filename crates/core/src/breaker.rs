// SPDX-License-Identifier: MIT

//! Persisted circuit breaker state.
//!
//! This module is the data shape only — the state machine transitions
//! live in `s2p-engine::circuit_breaker`, which is the sole
//! writer of values of this type.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerStateKind {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakerState {
    pub state: BreakerStateKind,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    /// Non-null iff `state` is `Open` or `HalfOpen`.
    pub opened_at: Option<u64>,
}

impl Default for BreakerState {
    fn default() -> Self {
        Self {
            state: BreakerStateKind::Closed,
            consecutive_failures: 0,
            consecutive_successes: 0,
            opened_at: None,
        }
    }
}

impl BreakerState {
    /// Structural invariant check, used by tests and by the storage layer's
    /// "corrupt file, use defaults" fallback.
    pub fn is_well_formed(&self) -> bool {
        match self.state {
            BreakerStateKind::Closed => self.opened_at.is_none(),
            BreakerStateKind::Open | BreakerStateKind::HalfOpen => self.opened_at.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_closed_and_well_formed() {
        let state = BreakerState::default();
        assert_eq!(state.state, BreakerStateKind::Closed);
        assert!(state.is_well_formed());
    }

    #[test]
    fn open_without_opened_at_is_malformed() {
        let state = BreakerState {
            state: BreakerStateKind::Open,
            opened_at: None,
            ..BreakerState::default()
        };
        assert!(!state.is_well_formed());
    }
}
