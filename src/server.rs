//!
//! src/server.rs
//!
//! HTTP surface: shared state, routes and handlers, plus the serve loop
//! with graceful shutdown
//!

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, Request, State},
    routing::get,
};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::errors::ServiceError;
use crate::probe::{self, ProbeReport, StorageSlot};
use crate::shape;
use crate::similar::SimilarityResolver;
use crate::types::{Message, SimilarPayload};

/// Built once in main, cloned into every handler
#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<SimilarityResolver>,
    pub storage: StorageSlot,
    pub storage_cfg: Arc<StorageConfig>,
}

#[derive(Debug, Deserialize)]
pub struct SimilarParams {
    pub song: Option<String>,
}

async fn root() -> Json<Message> {
    Json(Message { message: "Hello from the similar-songs backend!".to_string() })
}

async fn hello() -> Json<Message> {
    Json(Message { message: "Hello from the backend API!".to_string() })
}

async fn test_storage(State(state): State<AppState>) -> Json<ProbeReport> {
    Json(probe::probe(&state.storage, &state.storage_cfg).await)
}

async fn similar(
    State(state): State<AppState>,
    Query(params): Query<SimilarParams>,
) -> Result<Json<SimilarPayload>, ServiceError> {
    let song = params.song
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ServiceError::Validation(
            "query parameter `song` is required".to_string()
        ))?;

    let result = state.resolver.find_similar(&song).await?;
    info!(similar = result.similar.len(), "similar.done");
    Ok(Json(shape::shape(&result)))
}

/// Any origin, method and header with credentials. Origins are mirrored
/// since a wildcard is not allowed alongside credentials
fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/api/hello", get(hello))
        .route("/test", get(test_storage))
        .route("/api/similar", get(similar))
        .layer(cors())
        .layer(TraceLayer::new_for_http().make_span_with(|req: &Request| {
            tracing::info_span!(
                "http.request",
                request_id = %Uuid::new_v4(),
                method = %req.method(),
                path = %req.uri().path(),
            )
        }))
        .with_state(state)
}

pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: CancellationToken
) -> Result<(), ServiceError> {
    info!(addr = ?listener.local_addr()?, "server.start");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    info!("server.stop");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use reqwest::StatusCode;
    use url::Url;
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use wiremock::matchers::{method, path, query_param};

    use super::*;
    use crate::config::{HttpConfig, ItunesConfig};
    use crate::fetch::{CatalogSearch, ItunesClient};
    use crate::similar::{SEED_NOT_FOUND, SimilarityLimits};
    use crate::similar::tests::{FailingSearch, StubSearch, song, video};

    struct Running {
        addr: SocketAddr,
        shutdown: CancellationToken,
    }

    impl Running {
        fn url(&self, path: &str) -> String {
            format!("http://{}{}", self.addr, path)
        }
    }

    impl Drop for Running {
        fn drop(&mut self) {
            self.shutdown.cancel();
        }
    }

    async fn start(search: Arc<dyn CatalogSearch>) -> Running {
        let state = AppState {
            resolver: Arc::new(SimilarityResolver::new(search, SimilarityLimits::default())),
            storage: StorageSlot::NotConfigured,
            storage_cfg: Arc::new(StorageConfig::default()),
        };
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        tokio::spawn(serve(listener, state, shutdown.clone()));
        Running { addr, shutdown }
    }

    fn yesterday_stub() -> StubSearch {
        let artist = (2..22)
            .map(|i| song(i, &format!("Track {i}"), "The Beatles"))
            .collect();
        StubSearch::default()
            .with("Yesterday", 25, vec![song(1, "Yesterday", "The Beatles")])
            .with("The Beatles", 50, artist)
    }

    #[tokio::test]
    async fn greetings() {
        let app = start(Arc::new(StubSearch::default())).await;

        let body: serde_json::Value = reqwest::get(app.url("/")).await.unwrap()
            .json().await.unwrap();
        assert_eq!(body["message"], "Hello from the similar-songs backend!");

        let body: serde_json::Value = reqwest::get(app.url("/api/hello")).await.unwrap()
            .json().await.unwrap();
        assert_eq!(body["message"], "Hello from the backend API!");
    }

    #[tokio::test]
    async fn probe_endpoint_never_fails() {
        let app = start(Arc::new(StubSearch::default())).await;
        let resp = reqwest::get(app.url("/test")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["backend"], "✅ Running");
        assert_eq!(body["database_url"], "❌ Not Set");
        assert_eq!(body["collections"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn similar_returns_seed_and_capped_list() {
        let app = start(Arc::new(yesterday_stub())).await;
        let resp = reqwest::get(app.url("/api/similar?song=Yesterday")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body: SimilarPayload = resp.json().await.unwrap();
        assert_eq!(body.seed.track_id, Some(1));
        assert_eq!(body.similar.len(), 12);
        assert!(body.similar.iter().all(|t| t.track_id != Some(1)));
    }

    #[tokio::test]
    async fn missing_seed_is_404_with_detail() {
        let stub = StubSearch::default()
            .with("Nope", 25, vec![video(5, "Nope", "Someone")]);
        let app = start(Arc::new(stub)).await;

        let resp = reqwest::get(app.url("/api/similar?song=Nope")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body, serde_json::json!({ "detail": SEED_NOT_FOUND }));
    }

    #[tokio::test]
    async fn missing_or_blank_song_is_rejected() {
        let app = start(Arc::new(StubSearch::default())).await;
        for path in ["/api/similar", "/api/similar?song=", "/api/similar?song=%20%20"] {
            let resp = reqwest::get(app.url(path)).await.unwrap();
            assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY, "{path}");
        }
    }

    #[tokio::test]
    async fn upstream_failure_is_500_without_payload() {
        let app = start(Arc::new(FailingSearch)).await;
        let resp = reqwest::get(app.url("/api/similar?song=Yesterday")).await.unwrap();

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(resp.text().await.unwrap(), "Internal Server Error");
    }

    #[tokio::test]
    async fn cors_mirrors_origin_with_credentials() {
        let app = start(Arc::new(StubSearch::default())).await;
        let resp = reqwest::Client::new()
            .get(app.url("/api/hello"))
            .header("Origin", "https://frontend.example.com")
            .send()
            .await
            .unwrap();

        let headers = resp.headers();
        assert_eq!(
            headers.get("access-control-allow-origin").unwrap(),
            "https://frontend.example.com"
        );
        assert_eq!(headers.get("access-control-allow-credentials").unwrap(), "true");
    }

    #[tokio::test]
    async fn end_to_end_against_mock_catalog() {
        let upstream = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("term", "Yesterday"))
            .and(query_param("limit", "25"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "resultCount": 1,
                "results": [{
                    "kind": "song", "trackId": 1, "trackName": "Yesterday",
                    "artistName": "The Beatles", "collectionName": "Help!"
                }]
            })))
            .mount(&upstream)
            .await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("term", "The Beatles"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [
                    { "kind": "song", "trackId": 1, "trackName": "Yesterday", "artistName": "The Beatles" },
                    { "kind": "song", "trackId": 2, "trackName": "Help!", "artistName": "The Beatles" },
                    { "kind": "song", "trackId": 3, "trackName": "Help!", "artistName": "The Beatles" }
                ]
            })))
            .mount(&upstream)
            .await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("term", "Yesterday"))
            .and(query_param("limit", "50"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [
                    { "kind": "song", "trackId": 9, "trackName": "Yesterday", "artistName": "Boyz II Men" }
                ]
            })))
            .mount(&upstream)
            .await;

        let itunes = ItunesConfig { base_url: Url::parse(&format!("{}/", upstream.uri())).unwrap() };
        let client = ItunesClient::new(&HttpConfig::default(), &itunes).unwrap();
        let app = start(Arc::new(client)).await;

        let body: serde_json::Value = reqwest::get(app.url("/api/similar?song=Yesterday"))
            .await.unwrap()
            .json().await.unwrap();

        assert_eq!(body["seed"]["trackId"], 1);
        assert_eq!(body["seed"]["collectionName"], "Help!");
        assert!(body["seed"]["previewUrl"].is_null());
        let ids: Vec<_> = body["similar"].as_array().unwrap()
            .iter()
            .map(|t| t["trackId"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![2, 9]);
    }
}
