// SPDX-License-Identifier: MIT

//! Tracing setup for the binary. Every invocation is short-lived and its
//! stdout is reserved for task-mode output, so logs always go to stderr;
//! filtering is controlled by `STASH2PLEX_LOG` (falling back to `info`).

use tracing_subscriber::EnvFilter;

pub fn init() {
    let filter = EnvFilter::try_from_env("STASH2PLEX_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
