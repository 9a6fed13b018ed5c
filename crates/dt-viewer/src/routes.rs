//! HTTP routes of the viewer

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::Router;
use bytes::Bytes;
use futures::Stream;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use dt_core::config::{DvrConfig, MAX_CHANNEL};

use crate::mjpeg::{self, MosaicOptions};
use crate::mosaic::Layout;
use crate::pages::{self, ViewMode};
use crate::state::StreamState;

/// Allowed frame heights from the connection form
const TARGET_HEIGHT_RANGE: (u32, u32) = (180, 1080);

/// Shared state of the HTTP handlers
#[derive(Clone)]
pub struct ViewerState {
    pub streams: Arc<StreamState>,
    pub fps: u32,
    pub jpeg_quality: u8,
    /// Ends every open MJPEG stream when cancelled
    pub shutdown: CancellationToken,
}

/// Build the viewer router
pub fn create_router(state: ViewerState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/connect", post(connect))
        .route("/view", get(view))
        .route("/mosaic.mjpg", get(mosaic))
        .route("/healthcheck", get(healthcheck))
        .route("/:file", get(channel))
        .with_state(state)
}

async fn healthcheck() -> &'static str {
    "Healthy"
}

async fn index(State(state): State<ViewerState>) -> Html<String> {
    let settings = state.streams.settings().await;
    let connected = state.streams.is_connected().await;
    Html(pages::index(&settings, connected))
}

/// Merge the submitted connection form into `current`
///
/// Fields that are absent keep their defaults; `channels` may repeat. A
/// blank password keeps the current one, since the form never shows it.
fn parse_connect_form(body: &[u8], current: &DvrConfig) -> Result<DvrConfig, String> {
    let defaults = DvrConfig::default();
    let mut settings = DvrConfig {
        ip: String::new(),
        user: String::new(),
        password: String::new(),
        rtsp_port: current.rtsp_port,
        channels: Vec::new(),
        subtype: defaults.subtype,
        target_height: defaults.target_height,
    };

    for (key, value) in url::form_urlencoded::parse(body) {
        match key.as_ref() {
            "ip" => settings.ip = value.trim().to_string(),
            "user" => settings.user = value.trim().to_string(),
            "password" => settings.password = value.into_owned(),
            "channels" => settings.channels.push(
                value
                    .trim()
                    .parse()
                    .map_err(|_| format!("Invalid channel: {}", value))?,
            ),
            "subtype" => {
                settings.subtype = value
                    .trim()
                    .parse()
                    .map_err(|_| format!("Invalid subtype: {}", value))?
            }
            "target_height" => {
                let height: u32 = value
                    .trim()
                    .parse()
                    .map_err(|_| format!("Invalid frame height: {}", value))?;
                settings.target_height = height.clamp(TARGET_HEIGHT_RANGE.0, TARGET_HEIGHT_RANGE.1);
            }
            _ => {}
        }
    }

    if settings.ip.is_empty() {
        return Err("DVR address is required".to_string());
    }
    if settings.password.is_empty() {
        settings.password = current.password.clone();
    }

    Ok(settings)
}

async fn connect(State(state): State<ViewerState>, body: Bytes) -> Response {
    let current = state.streams.settings().await;
    match parse_connect_form(&body, &current) {
        Ok(settings) => {
            state.streams.start_streams(settings).await;
            Redirect::to("/view").into_response()
        }
        Err(message) => (StatusCode::BAD_REQUEST, message).into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct ViewQuery {
    mode: Option<String>,
}

async fn view(State(state): State<ViewerState>, Query(query): Query<ViewQuery>) -> Html<String> {
    let settings = state.streams.settings().await;
    Html(pages::view(
        ViewMode::parse(query.mode.as_deref()),
        &settings.channels,
    ))
}

fn mjpeg_response<S>(stream: S) -> Response
where
    S: Stream<Item = Result<Bytes, Infallible>> + Send + 'static,
{
    (
        [
            (header::CONTENT_TYPE, mjpeg::CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(stream),
    )
        .into_response()
}

/// Channel number from a `ch<n>.mjpg` file name
fn parse_channel_file(file: &str) -> Option<u8> {
    file.strip_prefix("ch")?.strip_suffix(".mjpg")?.parse().ok()
}

async fn channel(State(state): State<ViewerState>, Path(file): Path<String>) -> Response {
    let Some(ch) = parse_channel_file(&file) else {
        return (StatusCode::NOT_FOUND, "Not found").into_response();
    };

    match state.streams.feed(ch).await {
        Some(feed) => mjpeg_response(mjpeg::channel_stream(
            feed,
            state.fps,
            state.jpeg_quality,
            state.shutdown.clone(),
        )),
        None => (
            StatusCode::NOT_FOUND,
            format!(
                "Channel {} is not active. Reconfigure and select this channel.",
                ch
            ),
        )
            .into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct MosaicQuery {
    mode: Option<String>,
    cols: Option<String>,
    subset: Option<String>,
}

async fn mosaic(State(state): State<ViewerState>, Query(query): Query<MosaicQuery>) -> Response {
    let cols: u32 = match query.cols.as_deref().map(str::parse::<u32>).transpose() {
        Ok(cols) => cols.unwrap_or(2),
        Err(_) => return (StatusCode::BAD_REQUEST, "Invalid cols").into_response(),
    };
    if !(1..=u32::from(MAX_CHANNEL)).contains(&cols) {
        return (
            StatusCode::BAD_REQUEST,
            format!("cols must be between 1 and {}", MAX_CHANNEL),
        )
            .into_response();
    }

    let settings = state.streams.settings().await;
    let mut channels = settings.channels.clone();
    if query.subset.as_deref() == Some("first4") {
        channels.truncate(4);
    }

    let feeds = state.streams.feeds(&channels).await;
    if feeds.is_empty() {
        return (StatusCode::NOT_FOUND, "No channel is active.").into_response();
    }

    let layout = match query.mode.as_deref() {
        Some("grid") => Layout::Grid {
            cols,
            cell_height: settings.target_height,
        },
        _ => Layout::Row,
    };
    let options = MosaicOptions {
        layout,
        fps: state.fps,
        quality: state.jpeg_quality,
    };

    mjpeg_response(mjpeg::mosaic_stream(feeds, options, state.shutdown.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CaptureOptions;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_state() -> ViewerState {
        let options = CaptureOptions {
            ffmpeg_path: "dt-no-such-ffmpeg".to_string(),
            source_timeout: Duration::from_secs(1),
            reconnect_delay: Duration::from_millis(50),
            jpeg_quality: 80,
        };
        ViewerState {
            streams: Arc::new(StreamState::new(DvrConfig::default(), options)),
            fps: 12,
            jpeg_quality: 80,
            shutdown: CancellationToken::new(),
        }
    }

    async fn body_text(response: Response) -> String {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(body.to_vec()).unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn form_request(body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/connect")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap()
    }

    #[test]
    fn test_parse_channel_file() {
        assert_eq!(parse_channel_file("ch3.mjpg"), Some(3));
        assert_eq!(parse_channel_file("ch.mjpg"), None);
        assert_eq!(parse_channel_file("favicon.ico"), None);
    }

    #[test]
    fn test_parse_connect_form() {
        let current = DvrConfig {
            rtsp_port: 10554,
            ..Default::default()
        };
        let settings = parse_connect_form(
            b"ip=+10.0.0.9+&user=viewer&password=a%26b&channels=4&channels=2&subtype=1&target_height=5000",
            &current,
        )
        .unwrap();

        assert_eq!(settings.ip, "10.0.0.9");
        assert_eq!(settings.password, "a&b");
        assert_eq!(settings.channels, vec![4, 2]);
        assert_eq!(settings.subtype, 1);
        assert_eq!(settings.target_height, 1080);
        assert_eq!(settings.rtsp_port, 10554);

        assert!(parse_connect_form(b"ip=x&target_height=tall", &current).is_err());
        assert!(parse_connect_form(b"user=admin", &current).is_err());
    }

    #[test]
    fn test_blank_password_keeps_current() {
        let current = DvrConfig {
            password: "stored".to_string(),
            ..Default::default()
        };

        let settings = parse_connect_form(b"ip=10.0.0.9&user=admin&password=", &current).unwrap();
        assert_eq!(settings.password, "stored");
        let settings = parse_connect_form(b"ip=10.0.0.9&user=admin", &current).unwrap();
        assert_eq!(settings.password, "stored");

        let settings = parse_connect_form(b"ip=10.0.0.9&password=new", &current).unwrap();
        assert_eq!(settings.password, "new");
    }

    #[tokio::test]
    async fn test_healthcheck() {
        let app = create_router(test_state());
        let response = app.oneshot(get_request("/healthcheck")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "Healthy");
    }

    #[tokio::test]
    async fn test_index_renders_form() {
        let app = create_router(test_state());
        let response = app.oneshot(get_request("/")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains(r#"action="/connect""#));
        assert!(html.contains("Not connected"));
        assert!(!html.contains("Go to viewer"));
    }

    #[tokio::test]
    async fn test_inactive_channel_is_not_found() {
        let app = create_router(test_state());

        let response = app.clone().oneshot(get_request("/ch9.mjpg")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_text(response).await.contains("Channel 9 is not active"));

        let response = app.oneshot(get_request("/mosaic.mjpg")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_connect_starts_streams_and_redirects() {
        let state = test_state();
        let app = create_router(state.clone());

        let response = app
            .clone()
            .oneshot(form_request("ip=10.0.0.9&user=admin&password=pw&channels=3&channels=1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/view");
        assert_eq!(state.streams.settings().await.channels, vec![1, 3]);

        let response = app.clone().oneshot(get_request("/ch3.mjpg")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], mjpeg::CONTENT_TYPE);

        let response = app
            .clone()
            .oneshot(get_request("/mosaic.mjpg?mode=grid&cols=2&subset=first4"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(get_request("/view?mode=grid4")).await.unwrap();
        let html = body_text(response).await;
        assert!(html.contains(r#"<img src="/ch1.mjpg">"#));
        assert!(html.contains(r#"<img src="/ch3.mjpg">"#));

        state.shutdown.cancel();
        state.streams.stop_all().await;
    }

    #[tokio::test]
    async fn test_connect_rejects_bad_numbers() {
        let app = create_router(test_state());
        let response = app
            .clone()
            .oneshot(form_request("ip=10.0.0.9&channels=one"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(get_request("/mosaic.mjpg?cols=x"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_mosaic_rejects_out_of_range_cols() {
        let state = test_state();
        let app = create_router(state.clone());
        app.clone()
            .oneshot(form_request("ip=10.0.0.9&user=admin&channels=1"))
            .await
            .unwrap();

        for uri in [
            "/mosaic.mjpg?mode=grid&cols=4294967295",
            "/mosaic.mjpg?mode=grid&cols=100000",
            "/mosaic.mjpg?mode=grid&cols=17",
            "/mosaic.mjpg?mode=grid&cols=0",
        ] {
            let response = app.clone().oneshot(get_request(uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
            assert!(body_text(response).await.contains("between 1 and 16"));
        }

        let response = app
            .oneshot(get_request("/mosaic.mjpg?mode=grid&cols=16"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        state.shutdown.cancel();
        state.streams.stop_all().await;
    }

    #[tokio::test]
    async fn test_index_hides_password_and_viewer_link() {
        let state = test_state();
        let app = create_router(state.clone());
        app.clone()
            .oneshot(form_request("ip=10.0.0.9&user=admin&password=s3cret&channels=2"))
            .await
            .unwrap();

        let response = app.clone().oneshot(get_request("/")).await.unwrap();
        let html = body_text(response).await;
        assert!(!html.contains("s3cret"));
        assert!(html.contains("Go to viewer"));

        // Reconnecting without retyping the password keeps it
        app.oneshot(form_request("ip=10.0.0.9&user=admin&password=&channels=2"))
            .await
            .unwrap();
        assert_eq!(state.streams.settings().await.password, "s3cret");

        state.shutdown.cancel();
        state.streams.stop_all().await;
    }
}
