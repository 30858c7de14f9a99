use std::{
    future::Future,
    io::ErrorKind,
    path::{Path, PathBuf},
    process::Stdio,
};

use tracing::{debug, error, info, instrument};

use crate::{
    cache::{Cache, PartFile, is_cached},
    error::{ArchiveError, Result},
};

pub const AUDIO_EXTENSION: &str = "mp3";

/// Something that can turn a media file into an mp3 file at an exact path
pub trait Transcoder {
    fn transcode(&self, source: &Path, output: &Path) -> impl Future<Output = Result<()>> + Send;
}

/// Transcodes through an `ffmpeg` child process
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    program: PathBuf,
}

impl Default for Ffmpeg {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl Ffmpeg {
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Checks if ffmpeg is installed / available in PATH
    pub async fn is_installed(&self) -> bool {
        debug!("Checking for ffmpeg installation");
        tokio::process::Command::new(&self.program)
            .arg("-version")
            .stderr(Stdio::null())
            .stdout(Stdio::null())
            .status()
            .await
            .is_ok_and(|s| s.success())
    }
}

impl Transcoder for Ffmpeg {
    /// Extracts the audio track of `source` as mp3.
    /// The container format is forced so `output` may have any extension.
    #[instrument(skip(self))]
    async fn transcode(&self, source: &Path, output: &Path) -> Result<()> {
        let child = match tokio::process::Command::new(&self.program)
            .arg("-y")
            .args(["-loglevel", "error"])
            .arg("-i")
            .arg(source)
            .args(["-vn", "-f", AUDIO_EXTENSION])
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ArchiveError::ConversionFailed(format!(
                    "`{}` is not installed or available in PATH!",
                    self.program.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };

        let out = child.wait_with_output().await?;
        if !out.status.success() {
            error!("Audio conversion is unsuccessful");
            error!("stdout: {}", String::from_utf8_lossy(&out.stdout));
            error!("stderr: {}", String::from_utf8_lossy(&out.stderr));
            return Err(ArchiveError::ConversionFailed(format!(
                "ffmpeg exited with {}",
                out.status
            )));
        }

        Ok(())
    }
}

/// Converts cached media to mp3 at most once per output path
#[derive(Debug, Clone)]
pub struct AudioConverter<T> {
    transcoder: T,
    cache: Cache,
}

impl<T: Transcoder> AudioConverter<T> {
    #[must_use]
    pub const fn new(transcoder: T, cache: Cache) -> Self {
        Self { transcoder, cache }
    }

    #[must_use]
    pub const fn transcoder(&self) -> &T {
        &self.transcoder
    }

    /// `<out_dir>/<source stem>.mp3`
    #[must_use]
    pub fn output_path(source: &Path, out_dir: &Path) -> PathBuf {
        let mut name = source
            .file_stem()
            .unwrap_or(source.as_os_str())
            .to_os_string();
        name.push(".");
        name.push(AUDIO_EXTENSION);
        out_dir.join(name)
    }

    /// Converts `source` into `out_dir`, or returns the existing conversion untouched
    ///
    /// # Errors
    /// * [`ArchiveError::SourceNotFound`] if `source` does not exist
    /// * [`ArchiveError::ConversionFailed`] if the transcoder fails; no output is left behind
    #[instrument(skip(self))]
    pub async fn convert(&self, source: &Path, out_dir: &Path) -> Result<PathBuf> {
        let output = Self::output_path(source, out_dir);
        if is_cached(&output).await? {
            debug!("Audio cache hit");
            return Ok(output);
        }

        let _guard = self.cache.lock(&output).await;
        if is_cached(&output).await? {
            debug!("Audio converted by a concurrent request");
            return Ok(output);
        }

        if !is_cached(source).await? {
            return Err(ArchiveError::SourceNotFound(source.to_path_buf()));
        }

        tokio::fs::create_dir_all(out_dir).await?;
        let part = PartFile::new(&output);
        info!("Converting {source:?} to audio");
        self.transcoder.transcode(source, part.path()).await?;
        part.commit().await?;

        Ok(output)
    }
}
