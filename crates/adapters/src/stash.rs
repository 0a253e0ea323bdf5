// SPDX-License-Identifier: MIT

//! Stash client: GraphQL-over-HTTP with an API key header. Only the query
//! this pipeline needs — paginated scene listing for reconciliation sweeps
//! — is implemented, not a general GraphQL client.

use async_trait::async_trait;
use s2p_core::ScenePayload;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StashError {
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("stash returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("graphql errors: {0:?}")]
    GraphQl(Vec<String>),
}

impl StashError {
    pub fn http_status(&self) -> Option<u16> {
        match self {
            StashError::Request(e) => e.status().map(|s| s.as_u16()),
            StashError::Status { status, .. } => Some(*status),
            StashError::GraphQl(_) => None,
        }
    }

    pub fn is_network_error(&self) -> bool {
        matches!(self, StashError::Request(e) if e.is_connect() || e.is_timeout())
    }
}

/// A scene as reported by Stash, with the fields reconciliation and the
/// hook handlers need.
#[derive(Debug, Clone, PartialEq)]
pub struct StashScene {
    pub scene_id: s2p_core::SceneId,
    pub updated_at: i64,
    pub payload: ScenePayload,
}

#[async_trait]
pub trait StashClient: Send + Sync {
    /// Fetch one page of scenes, newest-updated first. `after` is an
    /// opaque cursor from a previous page's last scene id; `None` starts
    /// from the beginning.
    async fn list_scenes_page(
        &self,
        after: Option<i64>,
        page_size: u32,
    ) -> Result<Vec<StashScene>, StashError>;

    /// Fetch a single scene by id, used by the hook handler to get fresh
    /// field values for a just-mutated scene.
    async fn get_scene(&self, scene_id: s2p_core::SceneId) -> Result<StashScene, StashError>;
}

/// `reqwest`-backed [`StashClient`].
pub struct HttpStashClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpStashClient {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Result<Self, StashError> {
        Ok(Self {
            http: reqwest::Client::builder().build()?,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        })
    }

    async fn graphql<T: for<'de> Deserialize<'de>>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T, StashError> {
        #[derive(Deserialize)]
        struct GraphQlResponse<T> {
            data: Option<T>,
            #[serde(default)]
            errors: Vec<GraphQlError>,
        }
        #[derive(Deserialize)]
        struct GraphQlError {
            message: String,
        }

        let resp = self
            .http
            .post(&self.endpoint)
            .header("ApiKey", &self.api_key)
            .json(&serde_json::json!({ "query": query, "variables": variables }))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(StashError::Status {
                status: resp.status().as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }
        let parsed: GraphQlResponse<T> = resp.json().await?;
        if !parsed.errors.is_empty() {
            return Err(StashError::GraphQl(
                parsed.errors.into_iter().map(|e| e.message).collect(),
            ));
        }
        parsed
            .data
            .ok_or_else(|| StashError::GraphQl(vec!["empty response".to_string()]))
    }
}

#[async_trait]
impl StashClient for HttpStashClient {
    async fn list_scenes_page(
        &self,
        after: Option<i64>,
        page_size: u32,
    ) -> Result<Vec<StashScene>, StashError> {
        #[derive(Deserialize)]
        struct RawScene {
            id: String,
            title: Option<String>,
            details: Option<String>,
            date: Option<String>,
            rating100: Option<u32>,
            studio: Option<RawStudio>,
            performers: Vec<RawNamed>,
            tags: Vec<RawNamed>,
            path: String,
            updated_at: String,
        }
        #[derive(Deserialize)]
        struct RawStudio {
            name: String,
        }
        #[derive(Deserialize)]
        struct RawNamed {
            name: String,
        }
        #[derive(Deserialize)]
        struct Page {
            scenes: Vec<RawScene>,
        }

        let query = r#"
            query FindScenes($after: ID, $perPage: Int!) {
                findScenes(filter: { per_page: $perPage, sort: "updated_at", direction: DESC }, after: $after) {
                    scenes {
                        id title details date rating100 path updated_at
                        studio { name }
                        performers { name }
                        tags { name }
                    }
                }
            }
        "#;
        let page: Page = self
            .graphql(
                query,
                serde_json::json!({ "after": after, "perPage": page_size }),
            )
            .await?;

        page.scenes
            .into_iter()
            .map(|raw| {
                let scene_id = raw
                    .id
                    .parse::<i64>()
                    .ok()
                    .and_then(|id| s2p_core::SceneId::new(id).ok())
                    .ok_or_else(|| StashError::GraphQl(vec![format!("invalid scene id {}", raw.id)]))?;
                let updated_at = chrono::DateTime::parse_from_rfc3339(&raw.updated_at)
                    .map(|dt| dt.timestamp())
                    .unwrap_or(0);
                Ok(StashScene {
                    scene_id,
                    updated_at,
                    payload: ScenePayload {
                        title: raw.title,
                        details: raw.details,
                        date: raw.date,
                        rating100: raw.rating100,
                        studio: raw.studio.map(|s| s.name),
                        performers: raw.performers.into_iter().map(|p| p.name).collect(),
                        tags: raw.tags.into_iter().map(|t| t.name).collect(),
                        path: Some(raw.path),
                        poster_url: None,
                        background_url: None,
                        stash_updated_at: Some(updated_at),
                    },
                })
            })
            .collect()
    }

    async fn get_scene(&self, scene_id: s2p_core::SceneId) -> Result<StashScene, StashError> {
        let page = self.list_scenes_page(Some(scene_id.get() - 1), 1).await?;
        page.into_iter()
            .find(|s| s.scene_id == scene_id)
            .ok_or_else(|| StashError::GraphQl(vec![format!("scene {scene_id} not found")]))
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use tokio::sync::Mutex;

    /// In-memory fake seeded with a fixed scene list, for reconciliation
    /// and hook-handler tests.
    #[derive(Default)]
    pub struct FakeStashClient {
        scenes: Mutex<Vec<StashScene>>,
    }

    impl FakeStashClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn seed(&self, scene: StashScene) {
            self.scenes.lock().await.push(scene);
        }
    }

    #[async_trait]
    impl StashClient for FakeStashClient {
        async fn list_scenes_page(
            &self,
            after: Option<i64>,
            page_size: u32,
        ) -> Result<Vec<StashScene>, StashError> {
            let scenes = self.scenes.lock().await;
            let start = after.map(|a| a as usize).unwrap_or(0);
            Ok(scenes
                .iter()
                .skip(start)
                .take(page_size as usize)
                .cloned()
                .collect())
        }

        async fn get_scene(&self, scene_id: s2p_core::SceneId) -> Result<StashScene, StashError> {
            self.scenes
                .lock()
                .await
                .iter()
                .find(|s| s.scene_id == scene_id)
                .cloned()
                .ok_or_else(|| StashError::GraphQl(vec![format!("scene {scene_id} not found")]))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakeStashClient;
    use super::*;
    use s2p_core::SceneId;

    fn scene(id: i64, updated_at: i64) -> StashScene {
        StashScene {
            scene_id: SceneId::new(id).unwrap(),
            updated_at,
            payload: ScenePayload::default(),
        }
    }

    #[tokio::test]
    async fn fake_list_scenes_page_paginates() {
        let client = FakeStashClient::new();
        client.seed(scene(1, 100)).await;
        client.seed(scene(2, 200)).await;
        client.seed(scene(3, 300)).await;

        let page = client.list_scenes_page(None, 2).await.unwrap();
        assert_eq!(page.len(), 2);
        let page = client.list_scenes_page(Some(2), 2).await.unwrap();
        assert_eq!(page.len(), 1);
    }

    #[tokio::test]
    async fn fake_get_scene_finds_by_id() {
        let client = FakeStashClient::new();
        client.seed(scene(42, 100)).await;
        let found = client.get_scene(SceneId::new(42).unwrap()).await.unwrap();
        assert_eq!(found.updated_at, 100);
    }

    #[tokio::test]
    async fn fake_get_scene_missing_is_error() {
        let client = FakeStashClient::new();
        let err = client.get_scene(SceneId::new(1).unwrap()).await.unwrap_err();
        assert!(matches!(err, StashError::GraphQl(_)));
    }

    #[tokio::test]
    async fn http_client_sends_api_key_header_and_parses_scenes() {
        use wiremock::matchers::{header, method};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("ApiKey", "stash-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {
                    "scenes": [{
                        "id": "7",
                        "title": "A Scene",
                        "details": null,
                        "date": null,
                        "rating100": null,
                        "path": "/m/a.mp4",
                        "updated_at": "2026-01-01T00:00:00Z",
                        "studio": null,
                        "performers": [],
                        "tags": []
                    }]
                }
            })))
            .mount(&server)
            .await;

        let client = HttpStashClient::new(server.uri(), "stash-key").unwrap();
        let page = client.list_scenes_page(None, 10).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].scene_id, SceneId::new(7).unwrap());
        assert_eq!(page[0].payload.title, Some("A Scene".to_string()));
    }

    #[tokio::test]
    async fn http_client_surfaces_graphql_errors() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": null,
                "errors": [{"message": "scene not found"}]
            })))
            .mount(&server)
            .await;

        let client = HttpStashClient::new(server.uri(), "stash-key").unwrap();
        let err = client.list_scenes_page(None, 10).await.unwrap_err();
        assert!(matches!(err, StashError::GraphQl(_)));
    }
}
