// SPDX-License-Identifier: MIT

//! The stdin envelope Stash sends to every plugin invocation: `{hookContext,
//! args, server_connection}`. `hookContext` is present only for a hook-event
//! invocation; `args` carries the task mode selector and the plugin's
//! configured settings together, mirroring how Stash hands a plugin its own
//! settings map alongside the call's arguments; `server_connection`
//! describes how to reach Stash's own GraphQL API and is used as a fallback
//! when `stash_url` is not set explicitly in config.

use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum HookType {
    #[serde(rename = "Scene.Update.Post")]
    SceneUpdatePost,
    #[serde(rename = "Scene.Create.Post")]
    SceneCreatePost,
    #[serde(rename = "Scene.Destroy.Post")]
    SceneDestroyPost,
}

/// The hook-event payload. `input` is the raw GraphQL mutation input Stash
/// fired the hook with — just the fields that changed, not the full scene —
/// so a hook handler must re-fetch the scene for anything beyond the id.
#[derive(Debug, Clone, Deserialize)]
pub struct HookContext {
    #[serde(rename = "type")]
    pub hook_type: HookType,
    #[serde(default)]
    pub input: serde_json::Value,
}

impl HookContext {
    /// Pull the scene id out of `input`, accepting either a JSON number or
    /// a numeric string (Stash's GraphQL ID scalar serializes as a string).
    pub fn scene_id_raw(&self) -> Option<i64> {
        let id = self.input.get("id")?;
        if let Some(n) = id.as_i64() {
            return Some(n);
        }
        id.as_str()?.parse().ok()
    }

    /// True if any of the updated-field names in `input` are outside the
    /// set this pipeline syncs — play count and view history changes fire
    /// the same hook type but are not metadata mutations worth enqueuing.
    pub fn touches_only_ignored_fields(&self) -> bool {
        const IGNORED: &[&str] = &["play_count", "play_duration", "o_counter", "last_played_at", "resume_time"];
        let Some(obj) = self.input.as_object() else {
            return false;
        };
        obj.keys()
            .filter(|k| k.as_str() != "id")
            .all(|k| IGNORED.contains(&k.as_str()))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Args {
    pub mode: Option<String>,
    #[serde(flatten)]
    pub config: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConnection {
    #[serde(default, rename = "Scheme")]
    pub scheme: Option<String>,
    #[serde(default, rename = "Host")]
    pub host: Option<String>,
    #[serde(default, rename = "Port")]
    pub port: Option<u16>,
}

impl ServerConnection {
    pub fn graphql_url(&self) -> Option<String> {
        let port = self.port?;
        let scheme = self.scheme.as_deref().unwrap_or("http");
        let host = self.host.as_deref().filter(|h| !h.is_empty()).unwrap_or("localhost");
        Some(format!("{scheme}://{host}:{port}/graphql"))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Envelope {
    #[serde(default, rename = "hookContext")]
    pub hook_context: Option<HookContext>,
    #[serde(default)]
    pub args: Args,
    #[serde(default, rename = "server_connection")]
    pub server_connection: ServerConnection,
}

impl Envelope {
    pub fn from_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hook_event_envelope() {
        let raw = r#"{
            "hookContext": {"type": "Scene.Update.Post", "input": {"id": "42", "title": "New"}},
            "args": {}
        }"#;
        let envelope = Envelope::from_str(raw).expect("parse");
        let ctx = envelope.hook_context.expect("hook context");
        assert_eq!(ctx.hook_type, HookType::SceneUpdatePost);
        assert_eq!(ctx.scene_id_raw(), Some(42));
        assert!(!ctx.touches_only_ignored_fields());
    }

    #[test]
    fn parses_task_mode_envelope_with_flattened_config() {
        let raw = r#"{
            "args": {"mode": "view_status", "plex_url": "http://plex:32400", "max_retries": 5}
        }"#;
        let envelope = Envelope::from_str(raw).expect("parse");
        assert_eq!(envelope.args.mode.as_deref(), Some("view_status"));
        assert_eq!(
            envelope.args.config.get("plex_url").and_then(|v| v.as_str()),
            Some("http://plex:32400")
        );
    }

    #[test]
    fn play_count_only_change_is_ignored() {
        let raw = r#"{
            "hookContext": {"type": "Scene.Update.Post", "input": {"id": "1", "play_count": 3}}
        }"#;
        let envelope = Envelope::from_str(raw).expect("parse");
        let ctx = envelope.hook_context.expect("hook context");
        assert!(ctx.touches_only_ignored_fields());
    }

    #[test]
    fn server_connection_builds_graphql_url() {
        let raw = r#"{"server_connection": {"Scheme": "http", "Host": "", "Port": 9999}}"#;
        let envelope = Envelope::from_str(raw).expect("parse");
        assert_eq!(
            envelope.server_connection.graphql_url().as_deref(),
            Some("http://localhost:9999/graphql")
        );
    }
}
