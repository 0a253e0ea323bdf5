// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Durable, crash-safe persistence for Stash2Plex: the job queue, the
//! dead-letter store, the advisory worker lock, and atomic JSON state
//! files for everything else (breaker, outage history, recovery,
//! statistics, sync timestamps, reconciliation state).

pub mod atomic;
pub mod dlq_store;
pub mod lock;
pub mod queue;

pub use atomic::{read_json, write_json, AtomicStoreError};
pub use dlq_store::{DlqError, DlqStore};
pub use lock::{LockError, WorkerLock};
pub use queue::{DurableQueue, QueueError, QueueStats};
