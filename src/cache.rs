//! On-disk cache of playlists, segments and converted audio.
//!
//! An entry is valid as soon as a file exists at its path: entries are never
//! re-validated, expired or deleted. Writers always go through a sibling
//! `.part` file that is renamed into place, so a visible entry is a complete one.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
};

use tokio::{
    fs::File,
    io::AsyncWriteExt,
    sync::{Mutex as AsyncMutex, OwnedMutexGuard},
};
use tracing::{debug, warn};

use crate::error::{ArchiveError, Result};

pub const PLAYLIST_FILE_NAME: &str = "playlist.m3u8";

/// Path layout of the cache, `<root>/<live_id>/<file>`, plus the locks guarding its fills
#[derive(Debug, Clone)]
pub struct Cache {
    root: PathBuf,
    locks: Arc<KeyedLocks>,
}

impl Cache {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: Arc::new(KeyedLocks::new()),
        }
    }

    /// Serializes fills of the entry at `path` across every clone of this cache
    pub async fn lock(&self, path: &Path) -> OwnedMutexGuard<()> {
        self.locks.lock(path).await
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn live_dir(&self, live_id: &str) -> PathBuf {
        self.root.join(live_id)
    }

    #[must_use]
    pub fn playlist_path(&self, live_id: &str) -> PathBuf {
        self.live_dir(live_id).join(PLAYLIST_FILE_NAME)
    }

    #[must_use]
    pub fn segment_path(&self, key: &SegmentKey) -> PathBuf {
        self.live_dir(&key.live_id).join(&key.chunk)
    }
}

/// Cache identity of a remote segment: the last two components of its URL path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentKey {
    pub live_id: String,
    pub chunk: String,
}

impl SegmentKey {
    /// Derives the key from a segment URL, ignoring its query and fragment
    ///
    /// # Errors
    /// Errors with [`ArchiveError::InvalidRequest`] when the URL does not parse or
    /// its path has fewer than two usable components
    pub fn from_url(url: &str) -> Result<Self> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| ArchiveError::InvalidRequest(format!("segment url {url}: {e}")))?;

        let mut components = parsed
            .path_segments()
            .into_iter()
            .flatten()
            .rev()
            .filter(|c| !c.is_empty());
        let (Some(chunk), Some(live_id)) = (components.next(), components.next()) else {
            return Err(ArchiveError::InvalidRequest(format!(
                "segment url {url} has no `<live>/<chunk>` path"
            )));
        };

        let key = Self {
            live_id: live_id.to_string(),
            chunk: chunk.to_string(),
        };
        ensure_path_component(&key.live_id)?;
        ensure_path_component(&key.chunk)?;
        Ok(key)
    }
}

/// Rejects anything that would escape its parent directory once joined to a path
///
/// # Errors
/// Errors with [`ArchiveError::InvalidRequest`] on empty, `.`, `..` or separator-bearing names
pub fn ensure_path_component(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
        return Err(ArchiveError::InvalidRequest(format!(
            "`{name}` is not a valid file name"
        )));
    }
    Ok(())
}

static PART_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique sibling path a writer fills before renaming it onto `path`
#[must_use]
pub fn part_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map_or_else(String::new, |n| n.to_string_lossy().into_owned());
    let n = PART_COUNTER.fetch_add(1, Ordering::Relaxed);
    path.with_file_name(format!(".{name}.{}.{n}.part", std::process::id()))
}

/// Presence of a file at `path` is the whole cache check
///
/// # Errors
/// Errors when the path's existence cannot be determined
pub async fn is_cached(path: &Path) -> Result<bool> {
    Ok(tokio::fs::try_exists(path).await?)
}

/// Creates the parent directory of `path` when it does not exist yet
///
/// # Errors
/// Errors when the directory cannot be created
pub async fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    Ok(())
}

/// Writes `contents` to `path` so that readers only ever see the complete file
///
/// # Errors
/// Errors when the parent directory, the temp file or the rename fails.
/// The temp file is removed on failure.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    ensure_parent(path).await?;
    let part = PartFile::new(path);

    let mut file = File::create(part.path()).await?;
    file.write_all(contents).await?;
    file.sync_all().await?;
    drop(file);

    part.commit().await
}

/// A `.part` sibling of a cache entry that is removed on drop unless committed
///
/// Covers the early returns of a failed write as well as a writer future that
/// is dropped halfway, such as an aborted task.
#[derive(Debug)]
pub struct PartFile {
    part: PathBuf,
    target: PathBuf,
    committed: bool,
}

impl PartFile {
    #[must_use]
    pub fn new(target: &Path) -> Self {
        Self {
            part: part_path(target),
            target: target.to_path_buf(),
            committed: false,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.part
    }

    /// Moves the fully written part file onto its target
    ///
    /// # Errors
    /// Errors when the rename fails; the part file is removed in that case.
    pub async fn commit(mut self) -> Result<()> {
        tokio::fs::rename(&self.part, &self.target).await?;
        self.committed = true;
        debug!("Committed cache entry {:?}", self.target);
        Ok(())
    }
}

impl Drop for PartFile {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        match std::fs::remove_file(&self.part) {
            Ok(()) => debug!("Discarded partial file {:?}", self.part),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Unable to remove partial file {:?}: {e}", self.part),
        }
    }
}

/// One async mutex per cache path, so concurrent fills of the same entry run once
#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<PathBuf, Arc<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other task holds `key`, then holds it until the guard drops
    pub async fn lock(&self, key: &Path) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            // Only the map itself references idle locks
            locks.retain(|_, l| Arc::strong_count(l) > 1);
            locks
                .entry(key.to_path_buf())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
