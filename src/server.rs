//! An axum router serving a directory of media files with range support.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use axum::Router;
use axum::extract::{self, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum_extra::headers::CacheControl;

use crate::{KnownSize, RangeHeader, Ranged, SourceError, StreamingPolicy, content_type_for};

#[derive(Debug, Clone)]
pub struct MediaState {
    root: Arc<PathBuf>,
    policy: StreamingPolicy,
    cache_control: Option<CacheControl>,
}

impl MediaState {
    pub fn new(root: impl Into<PathBuf>, policy: StreamingPolicy) -> Self {
        MediaState {
            root: Arc::new(root.into()),
            policy,
            cache_control: None,
        }
    }

    pub fn with_cache_control(mut self, cache_control: Option<CacheControl>) -> Self {
        self.cache_control = cache_control;
        self
    }

    /// Maps a request path onto the media root. Returns `None` for anything
    /// that could escape it.
    fn resolve(&self, requested: &str) -> Option<PathBuf> {
        let mut path = self.root.as_ref().clone();
        let mut components = 0;
        for component in Path::new(requested).components() {
            match component {
                Component::Normal(part) => path.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
            }
            components += 1;
        }
        (components > 0).then_some(path)
    }
}

pub fn router(state: MediaState) -> Router {
    Router::new()
        .route("/media/{*path}", get(serve_media))
        .with_state(state)
}

#[tracing::instrument(skip(state, range), fields(range = ?range.0))]
async fn serve_media(
    State(state): State<MediaState>,
    extract::Path(path): extract::Path<String>,
    range: RangeHeader,
) -> Response {
    let Some(file_path) = state.resolve(&path) else {
        tracing::info!("rejected path outside media root");
        return SourceError::NotFound(PathBuf::from(path)).into_response();
    };

    let body = match KnownSize::open(&file_path).await {
        Ok(body) => body,
        Err(e) => {
            tracing::info!(error = %e, "media unavailable");
            return e.into_response();
        }
    };

    Ranged::new(range.into_inner(), body)
        .with_content_type(content_type_for(&file_path))
        .with_policy(state.policy)
        .with_cache_control(state.cache_control.clone())
        .into_response()
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;

    fn app() -> Router {
        crate::logging::init_test_logging();
        router(MediaState::new("test", StreamingPolicy::new(1024, 2048)))
    }

    async fn get(uri: &str, range: Option<&str>) -> Response {
        let mut request = Request::builder().uri(uri);
        if let Some(range) = range {
            request = request.header("Range", range);
        }
        app().oneshot(request.body(Body::empty()).unwrap()).await.unwrap()
    }

    fn header<'a>(response: &'a Response, name: &str) -> Option<&'a str> {
        response.headers().get(name).map(|v| v.to_str().unwrap())
    }

    #[test]
    fn test_resolve() {
        let state = MediaState::new("/srv/media", StreamingPolicy::default());
        assert_eq!(Some(PathBuf::from("/srv/media/course/intro.mp4")), state.resolve("course/intro.mp4"));
        assert_eq!(Some(PathBuf::from("/srv/media/intro.mp4")), state.resolve("./intro.mp4"));
        assert_eq!(None, state.resolve("../etc/passwd"));
        assert_eq!(None, state.resolve("course/../../etc/passwd"));
        assert_eq!(None, state.resolve("/etc/passwd"));
        assert_eq!(None, state.resolve(""));
    }

    #[tokio::test]
    async fn test_full_text_file() {
        let response = get("/media/fixture.txt", None).await;
        assert_eq!(StatusCode::OK, response.status());
        assert_eq!(Some("text/plain"), header(&response, "Content-Type"));
        assert_eq!(Some("54"), header(&response, "Content-Length"));
        assert_eq!(None, header(&response, "Accept-Ranges"));
    }

    #[tokio::test]
    async fn test_full_video_is_streamed() {
        // clip.mp4 is 4096 bytes, over the 2048 byte threshold
        let response = get("/media/clip.mp4", None).await;
        assert_eq!(StatusCode::OK, response.status());
        assert_eq!(Some("video/mp4"), header(&response, "Content-Type"));
        assert_eq!(Some("bytes"), header(&response, "Accept-Ranges"));
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(4096, body.len());
    }

    #[tokio::test]
    async fn test_open_ended_video_range() {
        let response = get("/media/clip.mp4", Some("bytes=1000-")).await;
        assert_eq!(StatusCode::PARTIAL_CONTENT, response.status());
        assert_eq!(Some("bytes 1000-2023/4096"), header(&response, "Content-Range"));
        assert_eq!(Some("1024"), header(&response, "Content-Length"));

        let expected = std::fs::read("test/clip.mp4").unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&expected[1000..2024], &body[..]);
    }

    #[tokio::test]
    async fn test_unsatisfiable_range() {
        let response = get("/media/clip.mp4", Some("bytes=4000-5000")).await;
        assert_eq!(StatusCode::RANGE_NOT_SATISFIABLE, response.status());
        assert_eq!(Some("bytes */4096"), header(&response, "Content-Range"));
    }

    #[tokio::test]
    async fn test_malformed_range() {
        let response = get("/media/clip.mp4", Some("bytes=oops")).await;
        assert_eq!(StatusCode::RANGE_NOT_SATISFIABLE, response.status());
    }

    #[tokio::test]
    async fn test_not_found() {
        assert_eq!(StatusCode::NOT_FOUND, get("/media/missing.mp4", None).await.status());
        assert_eq!(StatusCode::NOT_FOUND, get("/media/..%2FCargo.toml", None).await.status());
    }

    #[tokio::test]
    async fn test_cache_control() {
        let state = MediaState::new("test", StreamingPolicy::default())
            .with_cache_control(Some(CacheControl::new().with_no_store()));
        let request = Request::builder().uri("/media/fixture.txt").body(Body::empty()).unwrap();
        let response = router(state).oneshot(request).await.unwrap();
        assert_eq!(Some("no-store"), header(&response, "Cache-Control"));
    }
}
