//!
//! src/main.rs
//!
//! Wires configuration, logging, the catalog client and optional storage
//! into the http server. Live tests against the real catalog sit below
//!

mod config;
mod errors;
mod logging;

mod fetch;
mod probe;
mod server;
mod shape;
mod similar;
mod types;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::errors::ServiceError;

#[tokio::main]
async fn main() -> Result<(), ServiceError> {
    let cfgs = config::load_config()?;
    let _logger = logging::init_logging(&cfgs.logging)?;

    tracing::info!(
        service = "similar-songs",
        version = %env!("CARGO_PKG_VERSION"),
        "starting"
    );

    let itunes   = fetch::ItunesClient::new(&cfgs.http, &cfgs.itunes)?;
    let resolver = similar::SimilarityResolver::new(Arc::new(itunes), cfgs.similarity.clone());
    let storage  = probe::StorageSlot::from_config(&cfgs.storage);

    let state = server::AppState {
        resolver: Arc::new(resolver),
        storage,
        storage_cfg: Arc::new(cfgs.storage.clone()),
    };

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown.signal");
        }
        signal.cancel();
    });

    let listener = tokio::net::TcpListener::bind(cfgs.server.bind_addr()).await?;
    server::serve(listener, state, shutdown).await
}

/// Live Tests
/// iTunes search, set LIVE_HTTP=1 to hit the real api
#[cfg(test)]
mod tests {
    use super::*;

    fn live() -> bool {
        std::env::var("LIVE_HTTP").ok().as_deref() == Some("1")
    }

    #[tokio::test]
    async fn itunes_search_testbench() -> Result<(), ServiceError> {
        if !live() {
            eprintln!("Set LIVE_HTTP=1 to run");
            return Ok(())
        }

        let cfgs = config::load_config()?;
        let itunes = fetch::ItunesClient::new(&cfgs.http, &cfgs.itunes)?;

        let results = fetch::CatalogSearch::search(&itunes, "Yesterday", 25).await?;
        assert!(results.iter().any(types::TrackRecord::is_song));
        println!("results: {}", serde_json::to_string_pretty(&results)?);

        Ok(())
    }

    #[tokio::test]
    async fn similar_testbench() -> Result<(), ServiceError> {
        if !live() {
            eprintln!("Set LIVE_HTTP=1 to run");
            return Ok(())
        }

        let cfgs = config::load_config()?;
        let itunes = fetch::ItunesClient::new(&cfgs.http, &cfgs.itunes)?;
        let resolver = similar::SimilarityResolver::new(Arc::new(itunes), cfgs.similarity);

        // Yesterday - The Beatles
        let result = resolver.find_similar("Yesterday").await?;
        let payload = shape::shape(&result);
        assert!(payload.similar.len() <= similar::MAX_SIMILAR);
        println!("payload: {}", serde_json::to_string_pretty(&payload)?);

        Ok(())
    }
}
