// SPDX-License-Identifier: MIT

//! Config loading and validation: merges an optional TOML file on disk with
//! the envelope's `args` (Stash's own settings map always wins), validates
//! the required keys, and resolves the data directory the rest of the
//! binary persists state under.

use crate::envelope::{Args, ServerConnection};
use s2p_core::{PathRewriteRule, ReconciliationScope};
use s2p_engine::{FieldToggles, ReconcileInterval};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required config field(s): {}", .0.join(", "))]
    MissingFields(Vec<String>),
    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
    #[error("failed to read config file {path}: {source}")]
    ReadFile { path: String, source: std::io::Error },
    #[error("failed to parse config file {path}: {source}")]
    ParseFile { path: String, source: toml::de::Error },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub plex_url: String,
    pub plex_token: String,
    pub plex_library: Vec<String>,
    pub stash_url: String,
    pub stash_api_key: String,
    pub fields: FieldToggles,
    pub max_retries: Option<u32>,
    pub poll_interval: Duration,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub strict_matching: bool,
    pub preserve_plex_edits: bool,
    pub reconcile_interval: ReconcileInterval,
    pub reconcile_scope: ReconciliationScope,
    pub reconcile_missing: bool,
    pub reconcile_batch_size: u32,
    pub dlq_retention_days: u64,
    pub trigger_plex_scan: bool,
    pub path_rewrites: Vec<PathRewriteRule>,
    pub data_dir: PathBuf,
}

/// Read `STASH2PLEX_CONFIG_FILE` (if set) as TOML, then overlay the
/// envelope's `args` on top — the host's settings always take precedence
/// over whatever a local config file says.
fn merged_raw(args: &Args) -> Result<HashMap<String, Value>, ConfigError> {
    let mut raw = HashMap::new();
    if let Ok(path) = std::env::var("STASH2PLEX_CONFIG_FILE") {
        let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::ReadFile {
            path: path.clone(),
            source,
        })?;
        let table: toml::Table = toml::from_str(&contents).map_err(|source| ConfigError::ParseFile { path, source })?;
        for (k, v) in table {
            raw.insert(k, toml_to_json(v));
        }
    }
    for (k, v) in &args.config {
        raw.insert(k.clone(), v.clone());
    }
    Ok(raw)
}

fn toml_to_json(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Number(i.into()),
        toml::Value::Float(f) => serde_json::Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Array(a) => Value::Array(a.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(t) => Value::Object(t.into_iter().map(|(k, v)| (k, toml_to_json(v))).collect()),
        toml::Value::Datetime(d) => Value::String(d.to_string()),
    }
}

fn str_field(raw: &HashMap<String, Value>, key: &str) -> Option<String> {
    raw.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

fn bool_field(raw: &HashMap<String, Value>, key: &str, default: bool) -> bool {
    raw.get(key).and_then(|v| v.as_bool()).unwrap_or(default)
}

fn u32_field(raw: &HashMap<String, Value>, key: &str, default: u32) -> u32 {
    raw.get(key).and_then(|v| v.as_u64()).map(|n| n as u32).unwrap_or(default)
}

fn u64_field(raw: &HashMap<String, Value>, key: &str, default: u64) -> u64 {
    raw.get(key).and_then(|v| v.as_u64()).unwrap_or(default)
}

fn reconcile_interval(raw: &HashMap<String, Value>) -> Result<ReconcileInterval, ConfigError> {
    match str_field(raw, "reconcile_interval").as_deref() {
        None | Some("never") => Ok(ReconcileInterval::Never),
        Some("hourly") => Ok(ReconcileInterval::Hourly),
        Some("daily") => Ok(ReconcileInterval::Daily),
        Some("weekly") => Ok(ReconcileInterval::Weekly),
        Some(other) => Err(ConfigError::InvalidValue {
            field: "reconcile_interval".into(),
            message: format!("expected never/hourly/daily/weekly, got {other:?}"),
        }),
    }
}

fn reconcile_scope(raw: &HashMap<String, Value>) -> Result<ReconciliationScope, ConfigError> {
    match str_field(raw, "reconcile_scope").as_deref() {
        None | Some("all") => Ok(ReconciliationScope::All),
        Some("24h") => Ok(ReconciliationScope::Last24h),
        Some("7days") => Ok(ReconciliationScope::Last7Days),
        Some(other) => Err(ConfigError::InvalidValue {
            field: "reconcile_scope".into(),
            message: format!("expected all/24h/7days, got {other:?}"),
        }),
    }
}

fn path_rewrites(raw: &HashMap<String, Value>) -> Vec<PathRewriteRule> {
    let Some(array) = raw.get("path_rewrites").and_then(|v| v.as_array()) else {
        return Vec::new();
    };
    array
        .iter()
        .filter_map(|entry| {
            let find_prefix = entry.get("find_prefix")?.as_str()?.to_string();
            let replace_with = entry.get("replace_with")?.as_str()?.to_string();
            Some(PathRewriteRule { find_prefix, replace_with })
        })
        .collect()
}

fn data_dir(raw: &HashMap<String, Value>) -> PathBuf {
    if let Ok(dir) = std::env::var("STASH2PLEX_DATA_DIR") {
        return PathBuf::from(dir);
    }
    if let Some(dir) = str_field(raw, "data_dir") {
        return PathBuf::from(dir);
    }
    dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")).join("stash2plex")
}

impl Config {
    pub fn load(args: &Args, server_connection: &ServerConnection) -> Result<Self, ConfigError> {
        let raw = merged_raw(args)?;

        let mut missing = Vec::new();
        let plex_url = str_field(&raw, "plex_url").unwrap_or_else(|| {
            missing.push("plex_url".to_string());
            String::new()
        });
        let plex_token = str_field(&raw, "plex_token").unwrap_or_else(|| {
            missing.push("plex_token".to_string());
            String::new()
        });
        let plex_library_raw = str_field(&raw, "plex_library").unwrap_or_else(|| {
            missing.push("plex_library".to_string());
            String::new()
        });
        let stash_api_key = str_field(&raw, "stash_api_key").unwrap_or_else(|| {
            missing.push("stash_api_key".to_string());
            String::new()
        });
        let stash_url = str_field(&raw, "stash_url")
            .or_else(|| server_connection.graphql_url())
            .unwrap_or_else(|| {
                missing.push("stash_url".to_string());
                String::new()
            });

        if !missing.is_empty() {
            return Err(ConfigError::MissingFields(missing));
        }

        let plex_library = plex_library_raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        let fields = FieldToggles {
            title: bool_field(&raw, "sync_title", true),
            details: bool_field(&raw, "sync_details", true),
            date: bool_field(&raw, "sync_date", true),
            studio: bool_field(&raw, "sync_studio", true),
            performers: bool_field(&raw, "sync_performers", true),
            tags: bool_field(&raw, "sync_tags", true),
            artwork: bool_field(&raw, "sync_artwork", true),
        };

        Ok(Config {
            plex_url,
            plex_token,
            plex_library,
            stash_url,
            stash_api_key,
            fields,
            max_retries: raw.get("max_retries").and_then(|v| v.as_u64()).map(|n| n as u32),
            poll_interval: Duration::from_secs(u64_field(&raw, "poll_interval_sec", 1)),
            connect_timeout: Duration::from_secs(u64_field(&raw, "connect_timeout_sec", 10)),
            read_timeout: Duration::from_secs(u64_field(&raw, "read_timeout_sec", 30)),
            strict_matching: bool_field(&raw, "strict_matching", false),
            preserve_plex_edits: bool_field(&raw, "preserve_plex_edits", false),
            reconcile_interval: reconcile_interval(&raw)?,
            reconcile_scope: reconcile_scope(&raw)?,
            reconcile_missing: bool_field(&raw, "reconcile_missing", true),
            reconcile_batch_size: u32_field(&raw, "reconcile_batch_size", 100),
            dlq_retention_days: u64_field(&raw, "dlq_retention_days", 30),
            trigger_plex_scan: bool_field(&raw, "trigger_plex_scan", true),
            path_rewrites: path_rewrites(&raw),
            data_dir: data_dir(&raw),
        })
    }
}
