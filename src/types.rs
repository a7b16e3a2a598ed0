//!
//! src/types.rs
//!
//! Catalog records as the search api returns them, and the payloads
//! this service hands back
//!

use serde::{Deserialize, Serialize};

/// Kind discriminator of a playable track
pub const SONG_KIND: &str = "song";

/// One catalog entry. The upstream omits fields for non-purchasable or
/// region restricted entries, so every field is optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackRecord {
    pub track_id: Option<i64>,
    pub track_name: Option<String>,
    pub artist_name: Option<String>,
    pub collection_name: Option<String>,
    pub artwork_url100: Option<String>,
    pub preview_url: Option<String>,
    pub track_view_url: Option<String>,
    pub kind: Option<String>,
}

impl TrackRecord {
    pub fn is_song(&self) -> bool {
        self.kind.as_deref() == Some(SONG_KIND)
    }

    /// (trackName, artistName), the same song across several albums
    /// collapses to one key
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey(self.track_name.clone(), self.artist_name.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey(pub Option<String>, pub Option<String>);

/// Body of a search response, `results` may be absent
#[derive(Debug, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Vec<TrackRecord>,
}

#[derive(Debug, Clone)]
pub struct SimilarityResult {
    pub seed: TrackRecord,
    pub similar: Vec<TrackRecord>,
}

/// The seven fields exposed to clients, missing ones serialize as null
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicTrackView {
    pub track_id: Option<i64>,
    pub track_name: Option<String>,
    pub artist_name: Option<String>,
    pub collection_name: Option<String>,
    pub artwork_url100: Option<String>,
    pub preview_url: Option<String>,
    pub track_view_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarPayload {
    pub seed: PublicTrackView,
    pub similar: Vec<PublicTrackView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_upstream_record_and_ignores_extra_fields() {
        let raw = serde_json::json!({
            "wrapperType": "track",
            "kind": "song",
            "trackId": 1440833098,
            "trackName": "Yesterday",
            "artistName": "The Beatles",
            "collectionName": "Help!",
            "artworkUrl100": "https://example.com/100x100bb.jpg",
            "trackPrice": 1.29
        });
        let record: TrackRecord = serde_json::from_value(raw).unwrap();
        assert!(record.is_song());
        assert_eq!(record.track_id, Some(1440833098));
        assert_eq!(record.artwork_url100.as_deref(), Some("https://example.com/100x100bb.jpg"));
        assert_eq!(record.preview_url, None);
    }

    #[test]
    fn missing_results_is_empty() {
        let body: SearchResponse = serde_json::from_str(r#"{"resultCount": 0}"#).unwrap();
        assert!(body.results.is_empty());
    }

    #[test]
    fn non_song_kinds_are_not_songs() {
        let video = TrackRecord { kind: Some("music-video".into()), ..Default::default() };
        assert!(!video.is_song());
        assert!(!TrackRecord::default().is_song());
    }
}
