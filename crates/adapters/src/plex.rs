// SPDX-License-Identifier: MIT

//! Plex Media Server client: the subset of its HTTP API this pipeline
//! needs — a deep health probe, metadata field edits, and artwork upload.
//! Not a general Plex API client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlexError {
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("plex returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("no such rating key {0}")]
    NotFound(String),
}

impl PlexError {
    /// HTTP status carried by this error, if any — used to route through
    /// [`s2p_core::classify_http_status`].
    pub fn http_status(&self) -> Option<u16> {
        match self {
            PlexError::Request(e) => e.status().map(|s| s.as_u16()),
            PlexError::Status { status, .. } => Some(*status),
            PlexError::NotFound(_) => Some(404),
        }
    }

    pub fn is_network_error(&self) -> bool {
        matches!(self, PlexError::Request(e) if e.is_connect() || e.is_timeout())
    }
}

/// A single candidate media part as reported by a Plex library section,
/// used to build [`s2p_core::Candidate`] inputs for the matcher.
///
/// Plex's real `/library/sections/{id}/all` response nests `Part` records
/// several levels under each `Metadata` item (`Media[].Part[].file`); this
/// shape is the flattened one-row-per-part view this pipeline needs.
#[derive(Debug, Clone, Deserialize)]
pub struct PlexPart {
    pub rating_key: String,
    pub library_section: String,
    pub file_path: String,
}

/// The fields this pipeline is willing to write to a Plex item. Absent
/// fields are left untouched; present-but-empty strings clear the field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataEdit {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub studio: Option<String>,
    pub originally_available_at: Option<String>,
    pub performers: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
}

impl MetadataEdit {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.summary.is_none()
            && self.studio.is_none()
            && self.originally_available_at.is_none()
            && self.performers.is_none()
            && self.tags.is_none()
    }
}

/// Client for the Plex operations the worker needs.
#[async_trait]
pub trait PlexClient: Send + Sync {
    /// List every media part across the configured library sections, for
    /// the matcher to search.
    async fn list_parts(&self, library_sections: &[String]) -> Result<Vec<PlexPart>, PlexError>;

    /// `GET /identity` with a fixed 5s timeout — a deep probe requiring DB
    /// access, not merely a TCP accept.
    async fn health_probe(&self) -> Result<(), PlexError>;

    /// Fetch the item's current field values, to diff against before
    /// writing (skip the write if nothing would change).
    async fn get_current_fields(&self, rating_key: &str) -> Result<MetadataEdit, PlexError>;

    /// Apply an edit to the item's fields.
    async fn apply_edit(&self, rating_key: &str, edit: &MetadataEdit) -> Result<(), PlexError>;

    /// Upload artwork (poster or background) to the item.
    async fn upload_artwork(
        &self,
        rating_key: &str,
        kind: ArtworkKind,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), PlexError>;

    /// Issue one deferred library-section reload, rather than one per
    /// field written.
    async fn trigger_reload(&self, library_section: &str) -> Result<(), PlexError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtworkKind {
    Poster,
    Background,
}

impl ArtworkKind {
    fn path_segment(self) -> &'static str {
        match self {
            ArtworkKind::Poster => "poster",
            ArtworkKind::Background => "art",
        }
    }
}

/// `reqwest`-backed [`PlexClient`].
pub struct HttpPlexClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    device_id: String,
}

impl HttpPlexClient {
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        device_id: impl Into<String>,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self, PlexError> {
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(read_timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            token: token.into(),
            device_id: device_id.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Tag a request with the token and the persisted client identifier, so
    /// this pipeline shows up as one stable device in Plex's device list.
    fn identify(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("X-Plex-Token", &self.token)
            .header("X-Plex-Client-Identifier", &self.device_id)
            .header("X-Plex-Product", "Stash2Plex")
    }
}

#[async_trait]
impl PlexClient for HttpPlexClient {
    async fn list_parts(&self, library_sections: &[String]) -> Result<Vec<PlexPart>, PlexError> {
        let mut parts = Vec::new();
        for section in library_sections {
            let req = self
                .http
                .get(self.url(&format!("/library/sections/{section}/all")))
                .header("Accept", "application/json");
            let resp = self.identify(req).send().await?;
            if !resp.status().is_success() {
                return Err(PlexError::Status {
                    status: resp.status().as_u16(),
                    body: resp.text().await.unwrap_or_default(),
                });
            }
            let section_parts: Vec<PlexPart> = resp.json().await?;
            parts.extend(section_parts);
        }
        Ok(parts)
    }

    async fn health_probe(&self) -> Result<(), PlexError> {
        let req = self
            .http
            .get(self.url("/identity"))
            .timeout(Duration::from_secs(5));
        let resp = self.identify(req).send().await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(PlexError::Status {
                status: resp.status().as_u16(),
                body: resp.text().await.unwrap_or_default(),
            })
        }
    }

    async fn get_current_fields(&self, rating_key: &str) -> Result<MetadataEdit, PlexError> {
        let req = self
            .http
            .get(self.url(&format!("/library/metadata/{rating_key}")))
            .header("Accept", "application/json");
        let resp = self.identify(req).send().await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(PlexError::NotFound(rating_key.to_string()));
        }
        if !resp.status().is_success() {
            return Err(PlexError::Status {
                status: resp.status().as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }
        Ok(resp.json().await?)
    }

    async fn apply_edit(&self, rating_key: &str, edit: &MetadataEdit) -> Result<(), PlexError> {
        let mut form: HashMap<&str, String> = HashMap::new();
        if let Some(title) = &edit.title {
            form.insert("title.value", title.clone());
        }
        if let Some(summary) = &edit.summary {
            form.insert("summary.value", summary.clone());
        }
        if let Some(studio) = &edit.studio {
            form.insert("studio.value", studio.clone());
        }
        if let Some(date) = &edit.originally_available_at {
            form.insert("originallyAvailableAt.value", date.clone());
        }
        if let Some(performers) = &edit.performers {
            form.insert("actor.value", performers.join(","));
        }
        if let Some(tags) = &edit.tags {
            form.insert("genre.value", tags.join(","));
        }

        let req = self
            .http
            .put(self.url(&format!("/library/metadata/{rating_key}")))
            .query(&form);
        let resp = self.identify(req).send().await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(PlexError::Status {
                status: resp.status().as_u16(),
                body: resp.text().await.unwrap_or_default(),
            })
        }
    }

    async fn upload_artwork(
        &self,
        rating_key: &str,
        kind: ArtworkKind,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), PlexError> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .mime_str(content_type)
            .unwrap_or_else(|_| reqwest::multipart::Part::bytes(Vec::new()));
        let form = reqwest::multipart::Form::new().part("file", part);
        let req = self
            .http
            .post(self.url(&format!(
                "/library/metadata/{rating_key}/{}",
                kind.path_segment()
            )))
            .multipart(form);
        let resp = self.identify(req).send().await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(PlexError::Status {
                status: resp.status().as_u16(),
                body: resp.text().await.unwrap_or_default(),
            })
        }
    }

    async fn trigger_reload(&self, library_section: &str) -> Result<(), PlexError> {
        let req = self
            .http
            .get(self.url(&format!("/library/sections/{library_section}/refresh")));
        let resp = self.identify(req).send().await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(PlexError::Status {
                status: resp.status().as_u16(),
                body: resp.text().await.unwrap_or_default(),
            })
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use tokio::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    pub enum PlexCall {
        ListParts,
        HealthProbe,
        GetCurrentFields(String),
        ApplyEdit(String, MetadataEdit),
        UploadArtwork(String, ArtworkKind),
        TriggerReload(String),
    }

    /// In-memory fake for worker/reconciliation tests. Health probes and
    /// writes can be scripted to fail via [`FakePlexClient::set_healthy`]
    /// and [`FakePlexClient::fail_next_edit`].
    pub struct FakePlexClient {
        parts: Mutex<Vec<PlexPart>>,
        fields: Mutex<HashMap<String, MetadataEdit>>,
        healthy: Mutex<bool>,
        fail_next_edit: Mutex<Option<PlexError>>,
        calls: Mutex<Vec<PlexCall>>,
    }

    impl Default for FakePlexClient {
        fn default() -> Self {
            Self {
                parts: Mutex::new(Vec::new()),
                fields: Mutex::new(HashMap::new()),
                healthy: Mutex::new(true),
                fail_next_edit: Mutex::new(None),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl FakePlexClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn seed_part(&self, part: PlexPart) {
            self.parts.lock().await.push(part);
        }

        pub async fn set_healthy(&self, healthy: bool) {
            *self.healthy.lock().await = healthy;
        }

        pub async fn fail_next_edit_with(&self, error: PlexError) {
            *self.fail_next_edit.lock().await = Some(error);
        }

        pub async fn calls(&self) -> Vec<PlexCall> {
            self.calls.lock().await.clone()
        }
    }

    #[async_trait]
    impl PlexClient for FakePlexClient {
        async fn list_parts(&self, _library_sections: &[String]) -> Result<Vec<PlexPart>, PlexError> {
            self.calls.lock().await.push(PlexCall::ListParts);
            Ok(self.parts.lock().await.clone())
        }

        async fn health_probe(&self) -> Result<(), PlexError> {
            self.calls.lock().await.push(PlexCall::HealthProbe);
            if *self.healthy.lock().await {
                Ok(())
            } else {
                Err(PlexError::Status {
                    status: 503,
                    body: "simulated outage".into(),
                })
            }
        }

        async fn get_current_fields(&self, rating_key: &str) -> Result<MetadataEdit, PlexError> {
            self.calls
                .lock()
                .await
                .push(PlexCall::GetCurrentFields(rating_key.to_string()));
            Ok(self
                .fields
                .lock()
                .await
                .get(rating_key)
                .cloned()
                .unwrap_or_default())
        }

        async fn apply_edit(&self, rating_key: &str, edit: &MetadataEdit) -> Result<(), PlexError> {
            self.calls
                .lock()
                .await
                .push(PlexCall::ApplyEdit(rating_key.to_string(), edit.clone()));
            if let Some(err) = self.fail_next_edit.lock().await.take() {
                return Err(err);
            }
            self.fields
                .lock()
                .await
                .insert(rating_key.to_string(), edit.clone());
            Ok(())
        }

        async fn upload_artwork(
            &self,
            rating_key: &str,
            kind: ArtworkKind,
            _bytes: Vec<u8>,
            _content_type: &str,
        ) -> Result<(), PlexError> {
            self.calls
                .lock()
                .await
                .push(PlexCall::UploadArtwork(rating_key.to_string(), kind));
            Ok(())
        }

        async fn trigger_reload(&self, library_section: &str) -> Result<(), PlexError> {
            self.calls
                .lock()
                .await
                .push(PlexCall::TriggerReload(library_section.to_string()));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::{FakePlexClient, PlexCall};
    use super::*;

    #[tokio::test]
    async fn fake_health_probe_reflects_set_healthy() {
        let client = FakePlexClient::new();
        assert!(client.health_probe().await.is_ok());
        client.set_healthy(false).await;
        assert!(client.health_probe().await.is_err());
    }

    #[tokio::test]
    async fn fake_apply_edit_round_trips_through_get_current_fields() {
        let client = FakePlexClient::new();
        let edit = MetadataEdit {
            title: Some("New Title".into()),
            ..Default::default()
        };
        client.apply_edit("123", &edit).await.unwrap();
        let fetched = client.get_current_fields("123").await.unwrap();
        assert_eq!(fetched.title, Some("New Title".into()));
    }

    #[tokio::test]
    async fn fake_records_calls_in_order() {
        let client = FakePlexClient::new();
        client.health_probe().await.unwrap();
        client.list_parts(&[]).await.unwrap();
        let calls = client.calls().await;
        assert_eq!(calls, vec![PlexCall::HealthProbe, PlexCall::ListParts]);
    }

    #[test]
    fn metadata_edit_is_empty_when_no_fields_set() {
        assert!(MetadataEdit::default().is_empty());
        let edit = MetadataEdit {
            studio: Some("S".into()),
            ..Default::default()
        };
        assert!(!edit.is_empty());
    }

    #[tokio::test]
    async fn http_client_health_probe_sends_token_and_parses_status() {
        use wiremock::matchers::{header, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/identity"))
            .and(header("X-Plex-Token", "secret-token"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = HttpPlexClient::new(
            server.uri(),
            "secret-token",
            "test-device-id",
            Duration::from_secs(5),
            Duration::from_secs(5),
        )
        .unwrap();
        assert!(client.health_probe().await.is_ok());
    }

    #[tokio::test]
    async fn http_client_health_probe_surfaces_server_error_status() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/identity"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = HttpPlexClient::new(
            server.uri(),
            "secret-token",
            "test-device-id",
            Duration::from_secs(5),
            Duration::from_secs(5),
        )
        .unwrap();
        let err = client.health_probe().await.unwrap_err();
        assert_eq!(err.http_status(), Some(503));
    }
}
