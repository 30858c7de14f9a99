#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::cargo)]
#![warn(clippy::perf)]
#![warn(clippy::complexity)]
#![warn(clippy::style)]
#![allow(clippy::multiple_crate_versions)]

use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result, ensure};
use clap::{Parser, Subcommand};
use mirrativ_archive::{
    Archive, Config,
    config::DEFAULT_METADATA_URL,
    mirrativ::extract_live_id,
    server,
    util::{spawn_ct_watcher, warn_ulimit},
};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Fetches archived Mirrativ lives and turns their segments into audio
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Directory where playlists, segments and audio are cached
    #[arg(long, env = "MIRRATIV_CACHE_DIR", default_value = "cache")]
    cache_dir: PathBuf,

    /// Live metadata endpoint
    #[arg(long, env = "MIRRATIV_METADATA_URL", default_value = DEFAULT_METADATA_URL)]
    metadata_url: String,

    /// Connect timeout in seconds
    #[arg(long, env = "MIRRATIV_CONNECT_TIMEOUT", default_value_t = 3.0)]
    connect_timeout: f64,

    /// Read timeout in seconds
    #[arg(long, env = "MIRRATIV_READ_TIMEOUT", default_value_t = 7.5)]
    read_timeout: f64,

    /// ffmpeg executable used for audio conversion
    #[arg(long, env = "FFMPEG_PATH", default_value = "ffmpeg")]
    ffmpeg: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serves the archive over HTTP
    Serve {
        #[arg(short, long, env = "MIRRATIV_LISTEN", default_value = "127.0.0.1:8000")]
        listen: SocketAddr,
    },

    /// Prints a live's metadata
    Info {
        /// Mirrativ live ID / URL
        live: String,
    },

    /// Caches a live's archive playlist and prints its path
    Playlist { live: String },

    /// Prints the segments of a live's archive as JSON
    Segments { live: String },

    /// Downloads one segment and converts it to audio
    Audio {
        live: String,

        /// Segment file name, as listed by `segments`
        file_name: String,
    },

    /// Downloads and converts every segment of a live
    Archive {
        live: String,

        /// The amount of parallel downloads
        #[arg(short, long, default_value_t = 8)]
        parallelism: usize,
    },
}

impl Args {
    fn config(&self) -> Result<Config> {
        Ok(Config {
            cache_root: self.cache_dir.clone(),
            metadata_url: self.metadata_url.clone(),
            connect_timeout: Duration::try_from_secs_f64(self.connect_timeout)
                .context("Parsing connect timeout")?,
            read_timeout: Duration::try_from_secs_f64(self.read_timeout)
                .context("Parsing read timeout")?,
            ffmpeg: self.ffmpeg.clone(),
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = args.config()?;
    let archive = Archive::new(&config).context("Building HTTP client")?;

    let ct = CancellationToken::new();
    spawn_ct_watcher(ct.clone());

    match args.command {
        Command::Serve { listen } => {
            ensure_ffmpeg(&archive).await?;
            let listener = tokio::net::TcpListener::bind(listen)
                .await
                .context(format!("Binding {listen}"))?;
            server::serve(listener, Arc::new(archive), ct)
                .await
                .context("Serving HTTP")?;
        }
        Command::Info { live } => {
            let info = archive.live_info(&extract_live_id(&live)?).await?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Command::Playlist { live } => {
            let info = archive.live_info(&extract_live_id(&live)?).await?;
            let path = archive.playlist(&info).await?;
            println!("{}", path.display());
        }
        Command::Segments { live } => {
            let info = archive.live_info(&extract_live_id(&live)?).await?;
            let segments = archive.segments(&info).await?;
            println!("{}", serde_json::to_string_pretty(&segments)?);
        }
        Command::Audio { live, file_name } => {
            ensure_ffmpeg(&archive).await?;
            let info = archive.live_info(&extract_live_id(&live)?).await?;
            let path = archive
                .audio(&info, &file_name)
                .await
                .context(format!("Converting {file_name}"))?;
            println!("{}", path.display());
        }
        Command::Archive { live, parallelism } => {
            ensure_ffmpeg(&archive).await?;
            warn_ulimit();

            let info = archive.live_info(&extract_live_id(&live)?).await?;
            info!("Archiving live {} with {parallelism} parallelism", info.live_id);
            let paths = archive.archive_all(&info, parallelism, ct).await?;
            for path in paths {
                println!("{}", path.display());
            }
            info!("All done successfully!");
        }
    }

    Ok(())
}

async fn ensure_ffmpeg(archive: &Archive) -> Result<()> {
    ensure!(
        archive.converter().transcoder().is_installed().await,
        "ffmpeg is not installed!"
    );
    Ok(())
}
