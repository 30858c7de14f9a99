use reqwest::header::{
    ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE, CACHE_CONTROL, HeaderMap, HeaderValue, ORIGIN,
    REFERER, USER_AGENT,
};
use rlimit::Resource;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    config::Config,
    error::{ArchiveError, Result},
};

// Mirrativ rejects requests that don't look like they come from its web player
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/116.0.0.0 Safari/537.36";
const MIRRATIV_ORIGIN: &str = "https://www.mirrativ.com";
const MIRRATIV_REFERER: &str = "https://www.mirrativ.com/";

/// Builds the HTTP client shared by every remote call of the pipeline
///
/// # Errors
/// Errors when the TLS backend cannot be initialised
pub fn init_http_client(config: &Config) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert(
        ACCEPT_ENCODING,
        HeaderValue::from_static("gzip, deflate, br"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("ja"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(ORIGIN, HeaderValue::from_static(MIRRATIV_ORIGIN));
    headers.insert(REFERER, HeaderValue::from_static(MIRRATIV_REFERER));
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));

    reqwest::Client::builder()
        .default_headers(headers)
        .connect_timeout(config.connect_timeout)
        .read_timeout(config.read_timeout)
        .build()
        .map_err(ArchiveError::RemoteUnavailable)
}

/// Warns when the open file limit is too low for many parallel segment downloads
pub fn warn_ulimit() {
    match rlimit::getrlimit(Resource::NOFILE) {
        Ok((limit, _)) if limit <= 2048 => warn!(
            "Your file limit is very low which may introduce an error while archiving long lives. Consider raising your file limit via `ulimit -n 10240`"
        ),
        Ok(_) => {}
        Err(e) => warn!("Unable to read the open file limit: {e}"),
    }
}

/// Spawn a task that watches for CTRL + C signal and cancels a [`CancellationToken`] when caught
pub fn spawn_ct_watcher(ct: CancellationToken) {
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Caught CTRL+C signal!");
        ct.cancel();
    });
}
