#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::cargo)]
#![warn(clippy::perf)]
#![warn(clippy::complexity)]
#![warn(clippy::style)]
#![allow(clippy::multiple_crate_versions)]

pub mod archive;
pub mod cache;
pub mod config;
pub mod error;
pub mod ffmpeg;
pub mod mirrativ;
pub mod server;
pub mod util;

pub use archive::Archive;
pub use config::Config;
pub use error::{ArchiveError, Result};
