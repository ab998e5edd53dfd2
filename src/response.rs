use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::StatusCode;
use axum::http::header::RANGE;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use axum_extra::TypedHeader;
use axum_extra::headers::{AcceptRanges, CacheControl, ContentLength, ContentRange, ContentType};
use mime_guess::Mime;

use crate::file::is_media;
use crate::{ByteRange, ByteRangeSource, MAX_THRESHOLD_BYTES, RangeNotSatisfiable, RangeSpec, RangedStream, StreamingPolicy};

/// The raw `Range` header of a request, if any.
///
/// Extraction never fails: a header that is not valid text is kept (lossily
/// decoded) so that it is answered with a 416 rather than rejected by the
/// extractor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeHeader(pub Option<String>);

impl RangeHeader {
    pub fn into_inner(self) -> Option<String> {
        self.0
    }
}

impl<S: Send + Sync> FromRequestParts<S> for RangeHeader {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let range = parts
            .headers
            .get(RANGE)
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned());
        Ok(RangeHeader(range))
    }
}

/// The main responder type. Implements [`IntoResponse`].
#[derive(Debug)]
pub struct Ranged<B: ByteRangeSource + Send + 'static> {
    range: Option<String>,
    body: B,
    content_type: Mime,
    policy: StreamingPolicy,
    cache_control: Option<CacheControl>,
}

impl<B: ByteRangeSource + Send + 'static> Ranged<B> {
    /// Construct a ranged response over any type implementing
    /// [`ByteRangeSource`] and an optional raw `Range` header value.
    pub fn new(range: Option<String>, body: B) -> Self {
        Ranged {
            range,
            body,
            content_type: mime_guess::mime::APPLICATION_OCTET_STREAM,
            policy: StreamingPolicy::default(),
            cache_control: None,
        }
    }

    pub fn with_content_type(mut self, content_type: Mime) -> Self {
        self.content_type = content_type;
        self
    }

    pub fn with_policy(mut self, policy: StreamingPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_cache_control(mut self, cache_control: Option<CacheControl>) -> Self {
        self.cache_control = cache_control;
        self
    }

    /// Responds to the request, returning headers and body as
    /// [`RangedResponse`]. Returns [`RangeNotSatisfiable`] if the `Range`
    /// header was malformed or could not be satisfied.
    pub fn try_respond(self) -> Result<RangedResponse<B>, RangeNotSatisfiable> {
        let total_bytes = self.body.size();
        let content_type = self.content_type;
        let cache_control = self.cache_control;

        let Some(header) = self.range else {
            let streamed = self.policy.streams_full_response(total_bytes);
            let stream = if streamed {
                RangedStream::new(self.body, 0, total_bytes)
            } else {
                // one buffer for the whole resource, never more than the
                // largest threshold a valid policy allows
                let buffer = total_bytes.min(MAX_THRESHOLD_BYTES);
                let buffer = usize::try_from(buffer).unwrap_or(usize::MAX);
                RangedStream::with_buffer_size(self.body, 0, total_bytes, buffer)
            };
            tracing::debug!(total_bytes, streamed, "no range requested, serving full content");
            return Ok(RangedResponse::Full {
                content_length: ContentLength(total_bytes),
                accept_ranges: streamed || is_media(&content_type),
                stream,
                content_type,
                cache_control,
            });
        };

        let range = RangeSpec::parse(&header)
            .and_then(|spec| spec.resolve(total_bytes, &self.policy))
            .map_err(|e| {
                tracing::debug!(error = %e, "rejecting range request");
                RangeNotSatisfiable::for_size(total_bytes)
            })?;

        let content_range = content_range(range, total_bytes)
            .ok_or_else(|| RangeNotSatisfiable::for_size(total_bytes))?;
        tracing::debug!(start = range.start(), end = range.end(), total_bytes, "serving partial content");

        Ok(RangedResponse::Partial {
            content_range,
            content_length: ContentLength(range.len()),
            stream: self.body.read_range(range),
            content_type,
            cache_control,
        })
    }
}

fn content_range(range: ByteRange, total_bytes: u64) -> Option<ContentRange> {
    ContentRange::bytes(range.start()..=range.end(), total_bytes).ok()
}

impl<B: ByteRangeSource + Send + 'static> IntoResponse for Ranged<B> {
    fn into_response(self) -> Response {
        self.try_respond().into_response()
    }
}

/// Data type containing computed headers and body for a range response.
/// Implements [`IntoResponse`].
#[derive(Debug)]
pub enum RangedResponse<B> {
    /// Full content response, no range requested.
    Full {
        content_length: ContentLength,
        /// Whether `Accept-Ranges: bytes` is advertised.
        accept_ranges: bool,
        stream: RangedStream<B>,
        content_type: Mime,
        cache_control: Option<CacheControl>,
    },
    /// A single resolved range.
    Partial {
        content_range: ContentRange,
        content_length: ContentLength,
        stream: RangedStream<B>,
        content_type: Mime,
        cache_control: Option<CacheControl>,
    },
}

impl<B: ByteRangeSource + Send + 'static> IntoResponse for RangedResponse<B> {
    fn into_response(self) -> Response {
        match self {
            RangedResponse::Full { content_length, accept_ranges, stream, content_type, cache_control } => {
                let accept_ranges = accept_ranges.then(|| TypedHeader(AcceptRanges::bytes()));
                (
                    StatusCode::OK,
                    TypedHeader(ContentType::from(content_type)),
                    TypedHeader(content_length),
                    accept_ranges,
                    cache_control.map(TypedHeader),
                    stream,
                ).into_response()
            }
            RangedResponse::Partial { content_range, content_length, stream, content_type, cache_control } => {
                (
                    StatusCode::PARTIAL_CONTENT,
                    TypedHeader(ContentType::from(content_type)),
                    TypedHeader(content_range),
                    TypedHeader(content_length),
                    TypedHeader(AcceptRanges::bytes()),
                    cache_control.map(TypedHeader),
                    stream,
                ).into_response()
            }
        }
    }
}
