use serde::{Deserialize, Serialize};

/// Metadata of one Mirrativ live, as returned by the live API
///
/// The API returns many more fields; only the ones the archive needs are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveInfo {
    pub live_id: String,
    /// Absent or empty for lives that were never archived
    #[serde(default)]
    pub archive_url_hls: Option<String>,
}

impl LiveInfo {
    /// The archive playlist URL, if the live has one
    #[must_use]
    pub fn archive_url(&self) -> Option<&str> {
        self.archive_url_hls
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
    }
}

/// One chunk of an archive, in playback order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentInfo {
    pub filename: String,
    pub fileurl: String,
    /// Declared duration in seconds
    pub movie_length: f64,
}
