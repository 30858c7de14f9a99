use std::sync::LazyLock;

use regex::Regex;

use crate::{
    cache::ensure_path_component,
    error::{ArchiveError, Result},
};

pub mod api;
pub mod cdn;
pub mod playlist;
pub mod structs;

pub static LIVE_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://(?:www\.)?mirrativ\.com/live/([A-Za-z0-9_-]+)")
        .expect("live URL regex is valid")
});

/// Extracts a live ID out from a user-inputted URL string
///
/// # Errors
/// Error when the input is neither a Mirrativ live URL nor a usable live ID
pub fn extract_live_id(input: &str) -> Result<String> {
    let input = input.trim();
    if let Some(captures) = LIVE_URL_REGEX.captures(input) {
        return Ok(captures[1].to_string());
    }

    validate_live_id(input)?;
    Ok(input.to_string())
}

/// Live IDs name cache directories, so they must be a single path component
///
/// # Errors
/// Errors with [`ArchiveError::InvalidRequest`] when the ID is empty or could escape the cache root
pub fn validate_live_id(live_id: &str) -> Result<()> {
    ensure_path_component(live_id)
        .map_err(|_| ArchiveError::InvalidRequest(format!("`{live_id}` is not a live id")))
}
