use std::path::PathBuf;

use reqwest::StatusCode;

pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Every way the archive pipeline can fail.
///
/// Nothing in the crate retries; each variant is surfaced to the caller as-is.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// Timeout or connection failure talking to Mirrativ or its CDN
    #[error("remote is unavailable: {0}")]
    RemoteUnavailable(#[source] reqwest::Error),

    #[error("remote returned HTTP {status} for {url}")]
    RemoteError { status: u16, url: String },

    /// Live metadata did not decode into [`crate::mirrativ::structs::LiveInfo`]
    #[error("malformed live metadata: {0}")]
    MalformedResponse(String),

    /// The live exists but has no HLS archive
    #[error("live {0} has no archive")]
    MissingArchive(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("conversion source {} does not exist", .0.display())]
    SourceNotFound(PathBuf),

    #[error("audio conversion failed: {0}")]
    ConversionFailed(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ArchiveError {
    /// Classifies a `reqwest` failure into [`ArchiveError::RemoteError`] when it
    /// carries a status, [`ArchiveError::RemoteUnavailable`] otherwise.
    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::RemoteError {
                status: status.as_u16(),
                url: err.url().map(ToString::to_string).unwrap_or_default(),
            },
            None => Self::RemoteUnavailable(err),
        }
    }

    /// HTTP status an adapter should answer with for this error
    ///
    /// Every kind a caller can act on gets its own status. [`ArchiveError::Io`]
    /// is the catch-all for local failures and shares the generic 500.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::MissingArchive(_) => StatusCode::NOT_FOUND,
            Self::MalformedResponse(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::RemoteError { .. } => StatusCode::BAD_GATEWAY,
            Self::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            Self::RemoteUnavailable(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::SourceNotFound(_) => StatusCode::INSUFFICIENT_STORAGE,
            Self::ConversionFailed(_) | Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_maps_to_its_own_status() {
        let kinds = [
            ArchiveError::InvalidRequest("bad".into()),
            ArchiveError::MissingArchive("L1".into()),
            ArchiveError::MalformedResponse("missing field".into()),
            ArchiveError::RemoteError {
                status: 500,
                url: "https://cdn/".into(),
            },
            ArchiveError::Cancelled,
            ArchiveError::SourceNotFound(PathBuf::from("/nope.ts")),
            ArchiveError::ConversionFailed("exit 1".into()),
        ];
        let statuses: Vec<_> = kinds.iter().map(ArchiveError::status_code).collect();

        assert_eq!(
            statuses,
            [
                StatusCode::BAD_REQUEST,
                StatusCode::NOT_FOUND,
                StatusCode::UNPROCESSABLE_ENTITY,
                StatusCode::BAD_GATEWAY,
                StatusCode::SERVICE_UNAVAILABLE,
                StatusCode::INSUFFICIENT_STORAGE,
                StatusCode::INTERNAL_SERVER_ERROR,
            ]
        );
        for (i, a) in statuses.iter().enumerate() {
            for b in &statuses[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[tokio::test]
    async fn unreachable_remote_is_a_gateway_timeout() {
        // Nothing listens on port 1
        let err = reqwest::Client::new()
            .get("http://127.0.0.1:1/")
            .send()
            .await
            .unwrap_err();
        let err = ArchiveError::from_reqwest(err);

        assert!(matches!(err, ArchiveError::RemoteUnavailable(_)), "{err:?}");
        assert_eq!(err.status_code(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn remote_error_message_names_status_and_url() {
        let err = ArchiveError::RemoteError {
            status: 404,
            url: "https://cdn/h/L1/playlist.m3u8".into(),
        };
        assert_eq!(
            err.to_string(),
            "remote returned HTTP 404 for https://cdn/h/L1/playlist.m3u8"
        );
    }
}
