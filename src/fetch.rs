//!
//! src/fetch.rs
//!
//! Defines the catalog search seam and the iTunes client behind it.
//! One request per search, no retries
//!

use async_trait::async_trait;
use reqwest::{Client, header, redirect, RequestBuilder};
use url::Url;

use crate::config::{HttpConfig, ItunesConfig};
use crate::errors::ServiceError;
use crate::types::{SearchResponse, TrackRecord};

/// Keyword search over a music catalog, results in upstream order
#[async_trait]
pub trait CatalogSearch: Send + Sync {
    async fn search(&self, term: &str, limit: u32) -> Result<Vec<TrackRecord>, ServiceError>;
}

/// Client building functionality
fn client_helper(http: &HttpConfig) -> reqwest::ClientBuilder {
    Client::builder()
        .timeout(http.timeout)
        .connect_timeout(http.connect_timeout)
        .pool_max_idle_per_host(http.pool_max_idle_per_host)
        .pool_idle_timeout(Some(http.pool_idle_timeout))
        .redirect(redirect::Policy::limited(http.max_redirects as usize))
}

pub fn base_client(http: &HttpConfig) -> Result<Client, ServiceError> {
    let mut h = header::HeaderMap::new();
    h.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
    client_helper(http)
        .default_headers(h)
        .user_agent(concat!("similar-songs/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ServiceError::Config(format!("build client: {e}")))
}

#[derive(Clone, Debug)]
pub struct ItunesClient {
    pub http: Client,
    pub search_url: Url,
}

impl ItunesClient {
    pub fn new(http_config: &HttpConfig, cfg: &ItunesConfig) -> Result<Self, ServiceError> {
        let http = base_client(http_config)?;
        let search_url = cfg.base_url.join("search")
            .map_err(|e| ServiceError::Config(format!("itunes search url: {e}")))?;
        Ok( Self { http, search_url } )
    }

    /// GET /search?term=...&media=music&entity=song&limit=
    pub fn search_request(&self, term: &str, limit: u32) -> RequestBuilder {
        self.http.get(self.search_url.clone()).query(&[
            ("term", term),
            ("media", "music"),
            ("entity", "song"),
            ("limit", &limit.to_string()),
        ])
    }
}

#[async_trait]
impl CatalogSearch for ItunesClient {
    #[tracing::instrument(name = "catalog.search", skip(self), err(Display))]
    async fn search(&self, term: &str, limit: u32) -> Result<Vec<TrackRecord>, ServiceError> {
        let response = self.search_request(term, limit).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Upstream(
                format!("search returned status {status}")
            ));
        }

        // the api answers with text/javascript, so decode from bytes
        let body = response.bytes().await?;
        let parsed: SearchResponse = serde_json::from_slice(&body)?;

        tracing::debug!(status = %status, count = parsed.results.len(), "catalog.search.ok");
        Ok(parsed.results)
    }
}
