use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration,
};

use mirrativ_archive::{ArchiveError, Result, ffmpeg::Transcoder};

/// Writes `mp3:<source bytes>` to the output instead of running ffmpeg
#[derive(Clone, Default)]
pub struct MockTranscoder {
    pub calls: Arc<Mutex<Vec<PathBuf>>>,
    pub fail_with: Option<String>,
    pub delay: Option<Duration>,
}

impl MockTranscoder {
    pub fn failing(msg: &str) -> Self {
        Self {
            fail_with: Some(msg.to_string()),
            ..Self::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Transcoder for MockTranscoder {
    async fn transcode(&self, source: &Path, output: &Path) -> Result<()> {
        self.calls.lock().unwrap().push(source.to_path_buf());
        if let Some(delay) = self.delay {
            // Output appears before the encoder is done with it
            tokio::fs::write(output, b"partial").await?;
            tokio::time::sleep(delay).await;
        }
        if let Some(ref msg) = self.fail_with {
            // Leave a half-written file behind like a crashing encoder would
            tokio::fs::write(output, b"garbage").await?;
            return Err(ArchiveError::ConversionFailed(msg.clone()));
        }

        let mut audio = b"mp3:".to_vec();
        audio.extend(tokio::fs::read(source).await?);
        tokio::fs::write(output, audio).await?;
        Ok(())
    }
}
