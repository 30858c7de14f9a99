use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use tokio::{fs::File, net::TcpListener};
use tokio_util::{io::ReaderStream, sync::CancellationToken};
use tracing::{error, info, warn};

use crate::{
    Archive,
    error::ArchiveError,
    ffmpeg::Transcoder,
    mirrativ::structs::SegmentInfo,
};

impl IntoResponse for ArchiveError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("{self}");
        } else {
            warn!("{self}");
        }
        (status, self.to_string()).into_response()
    }
}

/// Routes of the archive API. Handlers only chain pipeline calls.
pub fn router<T>(archive: Arc<Archive<T>>) -> Router
where
    T: Transcoder + Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/", get(|| async { StatusCode::NOT_FOUND }))
        .route("/archive/{live_id}/m3u8", get(get_playlist::<T>))
        .route("/archive/{live_id}/segments", get(get_segments::<T>))
        .route("/archive/{live_id}/audio/{file_name}", get(get_audio::<T>))
        .with_state(archive)
}

/// Serves `router` on `listener` until `ct` is cancelled
///
/// # Errors
/// Errors when the listener fails
pub async fn serve<T>(
    listener: TcpListener,
    archive: Arc<Archive<T>>,
    ct: CancellationToken,
) -> std::io::Result<()>
where
    T: Transcoder + Clone + Send + Sync + 'static,
{
    info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, router(archive))
        .with_graceful_shutdown(async move { ct.cancelled().await })
        .await
}

async fn get_playlist<T>(
    Path(live_id): Path<String>,
    State(archive): State<Arc<Archive<T>>>,
) -> Result<Response, ArchiveError>
where
    T: Transcoder + Clone + Send + Sync + 'static,
{
    let info = archive.live_info(&live_id).await?;
    let path = archive.playlist(&info).await?;
    let text = tokio::fs::read_to_string(path).await?;

    Ok((
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        )],
        text,
    )
        .into_response())
}

async fn get_segments<T>(
    Path(live_id): Path<String>,
    State(archive): State<Arc<Archive<T>>>,
) -> Result<Json<Vec<SegmentInfo>>, ArchiveError>
where
    T: Transcoder + Clone + Send + Sync + 'static,
{
    let info = archive.live_info(&live_id).await?;
    Ok(Json(archive.segments(&info).await?))
}

async fn get_audio<T>(
    Path((live_id, file_name)): Path<(String, String)>,
    State(archive): State<Arc<Archive<T>>>,
) -> Result<Response, ArchiveError>
where
    T: Transcoder + Clone + Send + Sync + 'static,
{
    let info = archive.live_info(&live_id).await?;
    let path = archive.audio(&info, &file_name).await?;

    let file = File::open(&path).await?;
    let disposition = path.file_name().map_or_else(
        || HeaderValue::from_static("attachment"),
        |name| {
            HeaderValue::from_str(&format!("attachment; filename=\"{}\"", name.to_string_lossy()))
                .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
        },
    );

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("audio/mpeg")),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response())
}
