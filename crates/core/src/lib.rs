// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! s2p-core: domain types and pure functions shared by every Stash2Plex
//! crate — nothing in here touches the filesystem or the network.

pub mod breaker;
pub mod dlq;
pub mod error_kind;
pub mod id;
pub mod job;
pub mod matcher;
pub mod outage;
pub mod queue_row;
pub mod reconciliation;
pub mod recovery;
pub mod sanitize;
pub mod stats;

pub use breaker::{BreakerState, BreakerStateKind};
pub use dlq::DlqEntry;
pub use error_kind::{classify_exception, classify_http_status, ErrorKind, ExceptionHint};
pub use id::{JobId, SceneId};
pub use job::{Job, JobValidationError, ScenePayload, UpdateKind};
pub use matcher::{
    apply_path_rewrites, find_candidates, Candidate, MatchConfidence, MatchOutcome, MatcherError,
    PathRewriteRule,
};
pub use outage::{mtbf, mttr, OutageRecord};
pub use queue_row::{QueueRow, RowStatus};
pub use reconciliation::{GapKind, ReconciliationScope, ReconciliationState};
pub use recovery::RecoveryState;
pub use sanitize::sanitize_for_plex;
pub use stats::Stats;
