use std::path::{Path, PathBuf};

use tokio::{fs::File, io::AsyncWriteExt};
use tokio_stream::StreamExt;
use tracing::{debug, info, instrument};

use crate::{
    cache::{Cache, PartFile, SegmentKey, ensure_parent, is_cached, write_atomic},
    error::{ArchiveError, Result},
    mirrativ::{
        playlist::{base_url, parse_playlist},
        structs::LiveInfo,
        validate_live_id,
    },
};

/// Returns the cached archive playlist of a live, downloading it on first use
///
/// Once the playlist is on disk this never touches the network again.
///
/// # Errors
/// * [`ArchiveError::InvalidRequest`] if `info.live_id` cannot name a cache directory
/// * [`ArchiveError::MissingArchive`] if the live has no archive
/// * [`ArchiveError::RemoteUnavailable`] / [`ArchiveError::RemoteError`] when the download fails
/// * [`ArchiveError::Io`] when the playlist cannot be written
#[instrument(skip(client, cache, info), fields(live_id = %info.live_id))]
pub async fn fetch_playlist(
    client: &reqwest::Client,
    cache: &Cache,
    info: &LiveInfo,
) -> Result<PathBuf> {
    validate_live_id(&info.live_id)?;
    let url = archive_url(info)?;
    let path = cache.playlist_path(&info.live_id);
    if is_cached(&path).await? {
        debug!("Playlist cache hit");
        return Ok(path);
    }

    let _guard = cache.lock(&path).await;
    // Someone else may have filled it while we waited
    if is_cached(&path).await? {
        debug!("Playlist filled by a concurrent request");
        return Ok(path);
    }

    let body = fetch_playlist_text(client, url).await?;
    write_atomic(&path, body.as_bytes()).await?;
    info!("Cached playlist at {path:?}");

    Ok(path)
}

/// Fetches the archive playlist and resolves every chunk URL without caching anything
///
/// # Errors
/// Same as [`fetch_playlist`], minus the filesystem
#[instrument(skip(client, info), fields(live_id = %info.live_id))]
pub async fn fetch_playlist_urls(
    client: &reqwest::Client,
    info: &LiveInfo,
) -> Result<Vec<String>> {
    let url = archive_url(info)?;
    let body = fetch_playlist_text(client, url).await?;

    Ok(parse_playlist(&body, &base_url(url))
        .into_iter()
        .filter(|s| !s.filename.is_empty())
        .map(|s| s.fileurl)
        .collect())
}

/// Returns the cached copy of a segment, downloading it on first use
///
/// The file lives at `<cache_root>/<live_id>/<chunk>`, both taken from the URL path.
///
/// # Errors
/// * [`ArchiveError::InvalidRequest`] when the URL has no `<live_id>/<chunk>` path
/// * [`ArchiveError::RemoteUnavailable`] / [`ArchiveError::RemoteError`] when the download fails
/// * [`ArchiveError::Io`] when the segment cannot be written
#[instrument(skip(client, cache))]
pub async fn fetch_segment(client: &reqwest::Client, cache: &Cache, url: &str) -> Result<PathBuf> {
    let key = SegmentKey::from_url(url)?;
    let path = cache.segment_path(&key);
    if is_cached(&path).await? {
        debug!("Segment cache hit");
        return Ok(path);
    }

    let _guard = cache.lock(&path).await;
    if is_cached(&path).await? {
        debug!("Segment filled by a concurrent request");
        return Ok(path);
    }

    download_to(client, url, &path).await?;
    info!("Cached segment at {path:?}");

    Ok(path)
}

fn archive_url(info: &LiveInfo) -> Result<&str> {
    info.archive_url()
        .ok_or_else(|| ArchiveError::MissingArchive(info.live_id.clone()))
}

async fn fetch_playlist_text(client: &reqwest::Client, url: &str) -> Result<String> {
    info!("Fetching archive playlist");
    let res = client
        .get(url)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(ArchiveError::from_reqwest)?;

    res.text().await.map_err(ArchiveError::from_reqwest)
}

/// Streams `url` into a `.part` sibling of `path` and renames it into place
async fn download_to(client: &reqwest::Client, url: &str, path: &Path) -> Result<()> {
    let res = client
        .get(url)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(ArchiveError::from_reqwest)?;

    ensure_parent(path).await?;
    let part = PartFile::new(path);

    let mut file = File::create(part.path()).await?;
    let mut body = res.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(ArchiveError::from_reqwest)?;
        file.write_all(&chunk).await?;
    }
    file.sync_all().await?;
    drop(file);

    part.commit().await
}
