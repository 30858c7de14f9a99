use tracing::{info, instrument};

use crate::{
    error::{ArchiveError, Result},
    mirrativ::{structs::LiveInfo, validate_live_id},
};

/// Fetches a live's metadata. Never cached, a live can gain its archive later.
///
/// # Errors
/// * [`ArchiveError::InvalidRequest`] if `live_id` is not a usable ID
/// * [`ArchiveError::RemoteUnavailable`] on timeouts / connection failures
/// * [`ArchiveError::RemoteError`] on a non-2xx status
/// * [`ArchiveError::MalformedResponse`] when the body lacks the required fields
///   or names a live id that cannot be a cache directory
#[instrument(skip(client, metadata_url))]
pub async fn fetch_live_info(
    client: &reqwest::Client,
    metadata_url: &str,
    live_id: &str,
) -> Result<LiveInfo> {
    validate_live_id(live_id)?;

    info!("Fetching live info");
    let res = client
        .get(metadata_url)
        .query(&[("live_id", live_id)])
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(ArchiveError::from_reqwest)?;

    let body = res.text().await.map_err(ArchiveError::from_reqwest)?;

    let info = serde_json::from_str::<LiveInfo>(&body)
        .map_err(|e| ArchiveError::MalformedResponse(format!("live {live_id}: {e}")))?;

    // The returned id names the cache directory, not the requested one
    validate_live_id(&info.live_id).map_err(|_| {
        ArchiveError::MalformedResponse(format!(
            "live {live_id}: unusable live_id `{}`",
            info.live_id
        ))
    })?;

    Ok(info)
}
