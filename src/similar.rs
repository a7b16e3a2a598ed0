//!
//! src/similar.rs
//!
//! Resolves a free text song query into a seed track plus a list of
//! similar tracks. Songs by the seed's artist come first; when that pass
//! is thin the user's query is searched again to pick up covers and
//! remixes
//!

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info};

use crate::errors::ServiceError;
use crate::fetch::CatalogSearch;
use crate::types::{DedupKey, SimilarityResult, TrackRecord};

pub const SEED_NOT_FOUND: &str = "Song not found. Try a different name.";

/// Hard ceiling on the similar list regardless of pass
pub const MAX_SIMILAR: usize = 16;

#[derive(Debug, Clone)]
pub struct SimilarityLimits {
    pub seed_search_limit: u32,   // results scanned for a seed
    pub pool_search_limit: u32,   // results requested per broadening search
    pub primary_cap: usize,       // stop the artist pass here
    pub fallback_below: usize,    // broaden when fewer than this
    pub max_similar: usize,
}

impl Default for SimilarityLimits {
    fn default() -> Self {
        Self {
            seed_search_limit: 25,
            pool_search_limit: 50,
            primary_cap: 12,
            fallback_below: 8,
            max_similar: MAX_SIMILAR,
        }
    }
}

/// Accumulates the similar list under both exclusion rules
struct Collector {
    exclude_id: Option<i64>,
    seen: HashSet<DedupKey>,
    items: Vec<TrackRecord>,
}

impl Collector {
    /// A zero or absent seed id means nothing is excluded by id
    fn new(exclude_id: Option<i64>) -> Self {
        Self {
            exclude_id: exclude_id.filter(|id| *id != 0),
            seen: HashSet::new(),
            items: Vec::new(),
        }
    }

    fn offer(&mut self, record: &TrackRecord) {
        if !record.is_song() {
            return;
        }
        if self.exclude_id.is_some() && record.track_id == self.exclude_id {
            return;
        }
        if self.seen.insert(record.dedup_key()) {
            self.items.push(record.clone());
        }
    }

    /// Offers records in order until `cap` items are held
    fn fill(&mut self, records: &[TrackRecord], cap: usize) {
        for record in records {
            if self.items.len() >= cap {
                break;
            }
            self.offer(record);
        }
    }
}

pub struct SimilarityResolver {
    search: Arc<dyn CatalogSearch>,
    limits: SimilarityLimits,
}

impl SimilarityResolver {
    pub fn new(search: Arc<dyn CatalogSearch>, limits: SimilarityLimits) -> Self {
        Self { search, limits }
    }

    pub async fn find_similar(&self, song_query: &str) -> Result<SimilarityResult, ServiceError> {
        let seed = self.search
            .search(song_query, self.limits.seed_search_limit)
            .await?
            .into_iter()
            .find(TrackRecord::is_song)
            .ok_or_else(|| ServiceError::NotFound(SEED_NOT_FOUND.to_string()))?;

        info!(
            track_id = ?seed.track_id,
            artist = ?seed.artist_name,
            "similar.seed"
        );

        let mut collector = Collector::new(seed.track_id);

        if let Some(artist) = seed.artist_name.as_deref() {
            let by_artist = self.search
                .search(artist, self.limits.pool_search_limit)
                .await?;
            collector.fill(&by_artist, self.limits.primary_cap);
        }
        debug!(count = collector.items.len(), "similar.primary");

        if collector.items.len() < self.limits.fallback_below {
            let broadened = self.search
                .search(song_query, self.limits.pool_search_limit)
                .await?;
            collector.fill(&broadened, self.limits.max_similar);
            debug!(count = collector.items.len(), "similar.fallback");
        }

        let mut similar = collector.items;
        similar.truncate(self.limits.max_similar);

        Ok( SimilarityResult { seed, similar } )
    }
}
