use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    Router,
    extract::State,
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use mirrativ_archive::Config;
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

pub const METADATA_PATH: &str = "/api/live/live";

#[derive(Clone)]
struct Reply {
    status: StatusCode,
    body: Vec<u8>,
    delay: Option<Duration>,
}

#[derive(Default)]
struct Routes {
    replies: HashMap<String, Reply>,
    lives: HashMap<String, Reply>,
    request_counts: HashMap<String, usize>,
}

/// Local stand-in for the Mirrativ API and its HLS CDN.
///
/// Every request is counted by path (metadata requests by `live_id`).
#[derive(Clone)]
pub struct MockRemote {
    base_url: String,
    routes: Arc<Mutex<Routes>>,
}

impl MockRemote {
    /// Binds `127.0.0.1:0` and serves in the background
    pub async fn start() -> Self {
        let routes = Arc::new(Mutex::new(Routes::default()));
        let app = Router::new().fallback(handle).with_state(routes.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind mock remote");
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            routes,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Config pointing the metadata endpoint at this server
    pub fn config(&self, cache_root: &std::path::Path) -> Config {
        Config {
            metadata_url: self.url(METADATA_PATH),
            ..Config::with_cache_root(cache_root)
        }
    }

    pub fn serve(&self, path: &str, status: StatusCode, body: impl Into<Vec<u8>>) {
        self.routes.lock().unwrap().replies.insert(
            path.to_string(),
            Reply {
                status,
                body: body.into(),
                delay: None,
            },
        );
    }

    pub fn serve_slowly(&self, path: &str, body: impl Into<Vec<u8>>, delay: Duration) {
        self.routes.lock().unwrap().replies.insert(
            path.to_string(),
            Reply {
                status: StatusCode::OK,
                body: body.into(),
                delay: Some(delay),
            },
        );
    }

    pub fn serve_live(&self, live_id: &str, status: StatusCode, metadata: &Value) {
        self.routes.lock().unwrap().lives.insert(
            live_id.to_string(),
            Reply {
                status,
                body: metadata.to_string().into_bytes(),
                delay: None,
            },
        );
    }

    /// Registers a live whose archive playlist lives at `/hls/<live_id>/playlist.m3u8`
    pub fn serve_archive(&self, live_id: &str, playlist: &str) -> String {
        let playlist_url = self.url(&format!("/hls/{live_id}/playlist.m3u8"));
        self.serve_live(
            live_id,
            StatusCode::OK,
            &json!({
                "live_id": live_id,
                "title": "archived live",
                "archive_url_hls": playlist_url,
            }),
        );
        self.serve(
            &format!("/hls/{live_id}/playlist.m3u8"),
            StatusCode::OK,
            playlist,
        );
        playlist_url
    }

    pub fn request_count(&self, path: &str) -> usize {
        *self
            .routes
            .lock()
            .unwrap()
            .request_counts
            .get(path)
            .unwrap_or(&0)
    }

    pub fn metadata_request_count(&self, live_id: &str) -> usize {
        self.request_count(&format!("{METADATA_PATH}?live_id={live_id}"))
    }

    pub fn total_requests(&self) -> usize {
        self.routes.lock().unwrap().request_counts.values().sum()
    }
}

async fn handle(State(routes): State<Arc<Mutex<Routes>>>, uri: Uri) -> Response {
    let reply = {
        let mut routes = routes.lock().unwrap();
        let path = uri.path().to_string();

        let (key, reply) = if path == METADATA_PATH {
            let live_id = uri
                .query()
                .and_then(|q| q.split('&').find_map(|kv| kv.strip_prefix("live_id=")))
                .unwrap_or_default()
                .to_string();
            (
                format!("{METADATA_PATH}?live_id={live_id}"),
                routes.lives.get(&live_id).cloned(),
            )
        } else {
            let reply = routes.replies.get(&path).cloned();
            (path, reply)
        };

        *routes.request_counts.entry(key).or_default() += 1;
        reply
    };

    let Some(reply) = reply else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if let Some(delay) = reply.delay {
        tokio::time::sleep(delay).await;
    }
    (reply.status, reply.body).into_response()
}

/// Answers every request with a `content-length` larger than the bytes it sends.
///
/// With `stall` the connection is then held open, otherwise it is closed.
/// Returns the server's base URL; any path is accepted.
pub async fn serve_cut_short(sent: &'static [u8], declared_len: usize, stall: bool) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind cut-short server");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }

                let head = format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: video/mp2t\r\ncontent-length: {declared_len}\r\n\r\n"
                );
                if stream.write_all(head.as_bytes()).await.is_err()
                    || stream.write_all(sent).await.is_err()
                {
                    return;
                }
                stream.flush().await.ok();

                if stall {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                }
            });
        }
    });

    format!("http://{addr}")
}
