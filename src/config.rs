use std::{path::PathBuf, time::Duration};

pub const DEFAULT_METADATA_URL: &str = "https://www.mirrativ.com/api/live/live";
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(3000);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(7500);

/// Everything the pipeline needs to know about its environment.
///
/// Built once by the binary and handed to [`crate::Archive::new`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding one subdirectory per live id
    pub cache_root: PathBuf,
    /// Live metadata endpoint, queried with `?live_id=<id>`
    pub metadata_url: String,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    /// Program used for audio conversion
    pub ffmpeg: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_root: PathBuf::from("cache"),
            metadata_url: DEFAULT_METADATA_URL.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            ffmpeg: PathBuf::from("ffmpeg"),
        }
    }
}

impl Config {
    #[must_use]
    pub fn with_cache_root(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            cache_root: cache_root.into(),
            ..Self::default()
        }
    }
}
