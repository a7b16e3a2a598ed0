//!
//! src/shape.rs
//!
//! Projects internal track records into the minimal public view
//!

use crate::similar::MAX_SIMILAR;
use crate::types::{PublicTrackView, SimilarPayload, SimilarityResult, TrackRecord};

pub fn project(record: &TrackRecord) -> PublicTrackView {
    PublicTrackView {
        track_id: record.track_id,
        track_name: record.track_name.clone(),
        artist_name: record.artist_name.clone(),
        collection_name: record.collection_name.clone(),
        artwork_url100: record.artwork_url100.clone(),
        preview_url: record.preview_url.clone(),
        track_view_url: record.track_view_url.clone(),
    }
}

pub fn shape(result: &SimilarityResult) -> SimilarPayload {
    SimilarPayload {
        seed: project(&result.seed),
        similar: result.similar.iter()
            .take(MAX_SIMILAR)
            .map(project)
            .collect(),
    }
}
