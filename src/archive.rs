use std::{path::PathBuf, sync::Arc};

use tokio::{select, sync::Semaphore, task::JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::{
    cache::{Cache, ensure_path_component},
    config::Config,
    error::{ArchiveError, Result},
    ffmpeg::{AudioConverter, Ffmpeg, Transcoder},
    mirrativ::{
        api::fetch_live_info,
        cdn::{fetch_playlist, fetch_playlist_urls, fetch_segment},
        playlist::{SEGMENT_EXTENSION, base_url, parse_playlist},
        structs::{LiveInfo, SegmentInfo},
    },
    util::init_http_client,
};

/// The whole retrieval pipeline: metadata, playlist, segments and audio.
///
/// Cheap to clone; clones share the HTTP client and the cache locks.
#[derive(Debug, Clone)]
pub struct Archive<T = Ffmpeg> {
    client: reqwest::Client,
    metadata_url: String,
    cache: Cache,
    converter: AudioConverter<T>,
}

impl Archive<Ffmpeg> {
    /// # Errors
    /// Errors when the HTTP client cannot be built
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_transcoder(config, Ffmpeg::new(&config.ffmpeg))
    }
}

impl<T: Transcoder + Clone + Send + Sync + 'static> Archive<T> {
    /// # Errors
    /// Errors when the HTTP client cannot be built
    pub fn with_transcoder(config: &Config, transcoder: T) -> Result<Self> {
        let cache = Cache::new(&config.cache_root);
        Ok(Self {
            client: init_http_client(config)?,
            metadata_url: config.metadata_url.clone(),
            converter: AudioConverter::new(transcoder, cache.clone()),
            cache,
        })
    }

    #[must_use]
    pub const fn cache(&self) -> &Cache {
        &self.cache
    }

    #[must_use]
    pub const fn converter(&self) -> &AudioConverter<T> {
        &self.converter
    }

    /// # Errors
    /// See [`fetch_live_info`]
    pub async fn live_info(&self, live_id: &str) -> Result<LiveInfo> {
        fetch_live_info(&self.client, &self.metadata_url, live_id).await
    }

    /// # Errors
    /// See [`fetch_playlist`]
    pub async fn playlist(&self, info: &LiveInfo) -> Result<PathBuf> {
        fetch_playlist(&self.client, &self.cache, info).await
    }

    /// # Errors
    /// See [`fetch_playlist_urls`]
    pub async fn playlist_urls(&self, info: &LiveInfo) -> Result<Vec<String>> {
        fetch_playlist_urls(&self.client, info).await
    }

    /// Parses the cached playlist of a live, fetching it first if needed
    ///
    /// # Errors
    /// See [`fetch_playlist`]; also fails if the cached playlist cannot be read
    #[instrument(skip(self, info), fields(live_id = %info.live_id))]
    pub async fn segments(&self, info: &LiveInfo) -> Result<Vec<SegmentInfo>> {
        let path = self.playlist(info).await?;
        let text = tokio::fs::read_to_string(&path).await?;
        let url = info
            .archive_url()
            .ok_or_else(|| ArchiveError::MissingArchive(info.live_id.clone()))?;

        let segments = parse_playlist(&text, &base_url(url));
        debug!("Parsed {} segments", segments.len());
        Ok(segments)
    }

    /// # Errors
    /// See [`fetch_segment`]
    pub async fn segment(&self, url: &str) -> Result<PathBuf> {
        fetch_segment(&self.client, &self.cache, url).await
    }

    /// Downloads one chunk of a live's archive and converts it next to itself
    ///
    /// # Errors
    /// * [`ArchiveError::InvalidRequest`] if `file_name` is not a plain `.ts` file name
    /// * [`ArchiveError::MissingArchive`] if the live has no archive
    /// * anything [`Archive::segment`] or [`AudioConverter::convert`] fails with
    #[instrument(skip(self, info), fields(live_id = %info.live_id))]
    pub async fn audio(&self, info: &LiveInfo, file_name: &str) -> Result<PathBuf> {
        ensure_path_component(file_name)?;
        if !file_name.ends_with(SEGMENT_EXTENSION) {
            return Err(ArchiveError::InvalidRequest(format!(
                "`{file_name}` is not a segment"
            )));
        }

        let url = info
            .archive_url()
            .ok_or_else(|| ArchiveError::MissingArchive(info.live_id.clone()))?;
        let segment_url = format!("{}{file_name}", base_url(url));

        self.segment_audio(&segment_url).await
    }

    async fn segment_audio(&self, segment_url: &str) -> Result<PathBuf> {
        let source = self.segment(segment_url).await?;
        let out_dir = source
            .parent()
            .map_or_else(|| self.cache.root().to_path_buf(), std::path::Path::to_path_buf);
        self.converter.convert(&source, &out_dir).await
    }

    /// Downloads and converts every segment of a live, `parallelism` at a time
    ///
    /// Returns the audio files in playback order. Segments without a chunk line
    /// are skipped. Files finished before a failure or cancellation stay cached.
    ///
    /// # Errors
    /// The first error of any segment, or [`ArchiveError::Cancelled`] once `ct` fires
    #[instrument(skip(self, info, ct), fields(live_id = %info.live_id))]
    pub async fn archive_all(
        &self,
        info: &LiveInfo,
        parallelism: usize,
        ct: CancellationToken,
    ) -> Result<Vec<PathBuf>> {
        let segments = self.segments(info).await?;
        info!("Found {} segments to archive", segments.len());

        let permits = Arc::new(Semaphore::new(parallelism.max(1)));
        let mut tasks = JoinSet::new();

        for (index, segment) in segments.into_iter().enumerate() {
            if segment.fileurl.is_empty() {
                continue;
            }

            let archive = self.clone();
            let permits = permits.clone();
            let ct = ct.clone();
            tasks.spawn(async move {
                let permit = select! {
                    biased;
                    () = ct.cancelled() => None,
                    p = permits.acquire_owned() => p.ok(),
                };
                let Some(_permit) = permit else {
                    return (index, Err(ArchiveError::Cancelled));
                };
                (index, archive.segment_audio(&segment.fileurl).await)
            });
        }

        let mut done = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            let (index, result) = joined.map_err(|e| ArchiveError::Io(std::io::Error::other(e)))?;
            match result {
                Ok(path) => {
                    debug!("Archived segment #{index}");
                    done.push((index, path));
                }
                Err(e) => {
                    tasks.abort_all();
                    return Err(e);
                }
            }
        }

        done.sort_unstable_by_key(|(index, _)| *index);
        info!("Archived {} segments", done.len());
        Ok(done.into_iter().map(|(_, path)| path).collect())
    }
}
