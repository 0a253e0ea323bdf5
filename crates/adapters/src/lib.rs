// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! HTTP clients for Stash2Plex's two external collaborators: Plex (HTTP,
//! X-Plex-Token) and Stash (GraphQL over HTTP, API key header). Each is a
//! narrow trait covering only the operations the worker and reconciliation
//! engine need, with a `reqwest`-backed implementation and, behind
//! `test-support`, an in-memory fake for the rest of the workspace's tests.

pub mod plex;
pub mod stash;

pub use plex::{ArtworkKind, HttpPlexClient, MetadataEdit, PlexClient, PlexError, PlexPart};
pub use stash::{HttpStashClient, StashClient, StashError, StashScene};

#[cfg(any(test, feature = "test-support"))]
pub use plex::fake::FakePlexClient;
#[cfg(any(test, feature = "test-support"))]
pub use stash::fake::FakeStashClient;
