//! Local web UI.
//!
//! Serves a single page plus two API routes. `/api/speech` forwards the
//! browser's request body to the Kokoro server untouched and streams the
//! audio back, so the page never talks to Kokoro cross-origin.

use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use reqwest::Client;
use tracing::{info, warn};

use crate::client::{endpoint, SPEECH_PATH};
use crate::error::{Result, SayError};
use crate::runner::termination_signal;
use crate::voices::VOICES;

const INDEX_HTML: &str = include_str!("../web/index.html");
const BROWSER_DELAY: Duration = Duration::from_millis(500);

#[derive(Clone)]
pub struct ProxyState {
    speech_url: String,
    client: Client,
}

impl ProxyState {
    pub fn new(server_url: &str) -> Self {
        Self {
            speech_url: endpoint(server_url, SPEECH_PATH),
            client: Client::new(),
        }
    }
}

pub struct WebOptions {
    pub server_url: String,
    pub port: u16,
    pub open_browser: bool,
}

/// Build the axum router.
pub fn router(state: ProxyState) -> Router {
    Router::new()
        .route("/", get(handle_index))
        .route("/api/speech", post(handle_speech))
        .route("/api/voices", get(handle_voices))
        .with_state(state)
}

/// Bind on localhost and serve until interrupted.
pub async fn serve(options: WebOptions) -> Result<()> {
    let addr = SocketAddr::from(([127, 0, 0, 1], options.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| SayError::Web(format!("failed to bind {addr}: {e}")))?;

    let url = format!("http://{addr}");
    info!("Proxying speech requests to {}", options.server_url);
    println!("Starting web interface at {url}");
    println!("Press Ctrl+C to stop");

    if options.open_browser {
        tokio::spawn(async move {
            tokio::time::sleep(BROWSER_DELAY).await;
            open_browser(&url);
        });
    }

    let app = router(ProxyState::new(&options.server_url));
    axum::serve(listener, app)
        .with_graceful_shutdown(termination_signal())
        .await
        .map_err(|e| SayError::Web(e.to_string()))?;

    info!("Web interface stopped");
    Ok(())
}

/// Best-effort: a missing opener only gets logged.
fn open_browser(url: &str) {
    let mut cmd = if cfg!(target_os = "macos") {
        std::process::Command::new("open")
    } else if cfg!(target_os = "windows") {
        let mut cmd = std::process::Command::new("cmd");
        cmd.args(["/c", "start"]);
        cmd
    } else {
        std::process::Command::new("xdg-open")
    };

    match cmd.arg(url).spawn() {
        Ok(_) => info!("Opened browser at {url}"),
        Err(e) => warn!("Failed to open browser: {e}"),
    }
}

// --- Handlers ---

async fn handle_index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn handle_voices() -> Json<&'static [&'static str]> {
    Json(VOICES)
}

/// Streams the request body through as-is, so no body size limit applies.
async fn handle_speech(State(state): State<ProxyState>, body: Body) -> Response {
    let upstream = match state
        .client
        .post(&state.speech_url)
        .header(CONTENT_TYPE, "application/json")
        .body(reqwest::Body::wrap_stream(body.into_data_stream()))
        .send()
        .await
    {
        Ok(resp) => resp,
        Err(e) => {
            warn!("Kokoro unreachable at {}: {e}", state.speech_url);
            return (StatusCode::BAD_GATEWAY, "Kokoro server unavailable").into_response();
        }
    };

    let status = upstream.status();
    if !status.is_success() {
        warn!("Kokoro returned status {status}");
    }

    (
        status,
        [(CONTENT_TYPE, "audio/mpeg")],
        Body::from_stream(upstream.bytes_stream()),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{serve as serve_router, unused_local_url};
    use axum::body::Bytes;
    use futures_util::TryStreamExt;

    async fn proxy_for(upstream: &str) -> String {
        serve_router(router(ProxyState::new(upstream))).await
    }

    /// Upstream that answers with exactly the bytes it was sent.
    async fn echo_upstream() -> String {
        let echo = Router::new().route(SPEECH_PATH, post(|body: Bytes| async move { body }));
        serve_router(echo).await
    }

    #[tokio::test]
    async fn voices_match_catalog() {
        let proxy = proxy_for(&unused_local_url().await).await;

        let resp = reqwest::get(format!("{proxy}/api/voices")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let voices: Vec<String> = resp.json().await.unwrap();

        assert_eq!(voices, VOICES);
    }

    #[tokio::test]
    async fn speech_rejects_get() {
        let proxy = proxy_for(&unused_local_url().await).await;

        let resp = reqwest::get(format!("{proxy}/api/speech")).await.unwrap();

        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn speech_forwards_body_and_streams_audio() {
        let proxy = proxy_for(&echo_upstream().await).await;
        let raw = r#"{"input":  "Hi there", "voice":"af_sky","speed":1.0,"response_format":"mp3"}"#;

        let resp = Client::new()
            .post(format!("{proxy}/api/speech"))
            .header(CONTENT_TYPE, "application/json")
            .body(raw)
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[CONTENT_TYPE], "audio/mpeg");
        assert_eq!(resp.bytes().await.unwrap(), raw.as_bytes());
    }

    #[tokio::test]
    async fn large_body_is_streamed_without_limit() {
        async fn count_bytes(body: Body) -> String {
            let total = body
                .into_data_stream()
                .try_fold(0usize, |n, chunk| async move { Ok(n + chunk.len()) })
                .await
                .unwrap();
            total.to_string()
        }

        let upstream = serve_router(Router::new().route(SPEECH_PATH, post(count_bytes))).await;
        let proxy = proxy_for(&upstream).await;
        let padding = "a".repeat(3 * 1024 * 1024);
        let raw = format!(r#"{{"input":"{padding}","voice":"af_heart"}}"#);

        let resp = Client::new()
            .post(format!("{proxy}/api/speech"))
            .body(raw.clone())
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.text().await.unwrap(), raw.len().to_string());
    }

    #[tokio::test]
    async fn upstream_status_is_passed_through() {
        let failing = Router::new().route(
            SPEECH_PATH,
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "model not loaded") }),
        );
        let proxy = proxy_for(&serve_router(failing).await).await;

        let resp = Client::new()
            .post(format!("{proxy}/api/speech"))
            .body("{}")
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(resp.headers()[CONTENT_TYPE], "audio/mpeg");
        assert_eq!(resp.text().await.unwrap(), "model not loaded");
    }

    #[tokio::test]
    async fn unreachable_upstream_is_bad_gateway() {
        let proxy = proxy_for(&unused_local_url().await).await;

        let resp = Client::new()
            .post(format!("{proxy}/api/speech"))
            .body("{}")
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn index_serves_page() {
        let proxy = proxy_for(&unused_local_url().await).await;

        let resp = reqwest::get(format!("{proxy}/")).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let content_type = resp.headers()[CONTENT_TYPE].to_str().unwrap().to_string();
        assert!(content_type.starts_with("text/html"), "{content_type}");
        assert!(resp.text().await.unwrap().contains("/api/speech"));
    }
}
