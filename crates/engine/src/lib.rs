// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! The sync pipeline's stateful core: circuit breaker, outage history,
//! recovery scheduler, durable-queue worker loop, and the reconciliation
//! sweep that compares Stash and Plex wholesale. Everything here is
//! storage- and adapter-agnostic — it is driven by the `stash2plex`
//! binary, which owns configuration loading and process lifecycle.

pub mod backoff;
pub mod circuit_breaker;
pub mod config;
pub mod outage_history;
pub mod pending_set;
pub mod reconciliation;
pub mod reconciliation_scheduler;
pub mod recovery_scheduler;
pub mod stats;
pub mod sync_timestamps;
pub mod worker;

pub use circuit_breaker::{BreakerConfig, BreakerError, CircuitBreaker};
pub use config::{build_metadata_job, FieldToggles, WorkerConfig};
pub use outage_history::{OutageHistory, OutageHistoryError};
pub use pending_set::{PendingSet, HOOK_DEDUP_WINDOW_SEC};
pub use reconciliation::{ReconciliationConfig, ReconciliationError, ReconciliationOutcome};
pub use reconciliation_scheduler::{
    ReconcileInterval, ReconciliationScheduler, ReconciliationSchedulerError,
};
pub use recovery_scheduler::{RecoverySchedulerError, RecoveryScheduler};
pub use stats::{StatsStore, StatsStoreError};
pub use sync_timestamps::{SyncTimestamps, SyncTimestampsError};
pub use worker::{JobOutcome, TickOutcome, Worker, WorkerError};
