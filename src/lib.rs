//! # media-range
//!
//! Seekable HTTP range responses for stored media, for [`axum`][1].
//!
//! A `Range` header of the form `bytes=<start>-<end>`, `bytes=<start>-` or
//! `bytes=-<suffix>` is parsed into a [`RangeSpec`], resolved against the
//! size of the resource into a [`ByteRange`], and answered with a 206 that
//! streams exactly that window. Open-ended requests are capped by the
//! [`StreamingPolicy`] so video players receive a large file a chunk at a
//! time. Malformed or unsatisfiable ranges get a bodiless 416.
//!
//! Any type implementing both [`AsyncRead`] and [`AsyncSeekStart`] can be
//! served through the [`KnownSize`] adapter. [`KnownSize::open`] handles the
//! common case of a file on disk.
//!
//! ```no_run
//! use axum::Router;
//! use axum::routing::get;
//!
//! use media_range::{KnownSize, RangeHeader, Ranged, SourceError};
//!
//! async fn lesson(RangeHeader(range): RangeHeader) -> Result<Ranged<KnownSize<tokio::fs::File>>, SourceError> {
//!     let body = KnownSize::open("lesson.mp4").await?;
//!     let content_type = media_range::content_type_for("lesson.mp4");
//!     Ok(Ranged::new(range, body).with_content_type(content_type))
//! }
//!
//! let _app = Router::<()>::new().route("/lesson", get(lesson));
//! ```
//!
//! [1]: https://docs.rs/axum

mod error;
mod file;
mod policy;
mod range;
mod response;
mod stream;

pub mod config;
pub mod logging;
pub mod server;

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncSeek};

pub use error::{RangeError, RangeNotSatisfiable, SourceError};
pub use file::{KnownSize, content_type_for, is_media};
pub use policy::{DEFAULT_CHUNK_CAP_BYTES, DEFAULT_THRESHOLD_BYTES, MAX_THRESHOLD_BYTES, PolicyError, StreamingPolicy};
pub use range::{ByteRange, RangeSpec};
pub use response::{RangeHeader, Ranged, RangedResponse};
pub use stream::{IO_BUFFER_SIZE, RangedStream};

/// [`AsyncSeek`] narrowed to only allow seeking from start.
pub trait AsyncSeekStart {
    /// Same semantics as [`AsyncSeek::start_seek`], always passing position as the `SeekFrom::Start` variant.
    fn start_seek(self: Pin<&mut Self>, position: u64) -> io::Result<()>;

    /// Same semantics as [`AsyncSeek::poll_complete`], returning `()` instead of the new stream position.
    fn poll_complete(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>>;
}

impl<T: AsyncSeek> AsyncSeekStart for T {
    fn start_seek(self: Pin<&mut Self>, position: u64) -> io::Result<()> {
        AsyncSeek::start_seek(self, io::SeekFrom::Start(position))
    }

    fn poll_complete(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        AsyncSeek::poll_complete(self, cx).map_ok(|_| ())
    }
}

/// An [`AsyncRead`] and [`AsyncSeekStart`] with a fixed known byte size.
pub trait ByteRangeSource: AsyncRead + AsyncSeekStart {
    /// The total size of the underlying resource.
    ///
    /// This should not change for the lifetime of the object once queried.
    /// Behaviour is not guaranteed if it does change.
    fn size(&self) -> u64;

    /// Streams the bytes of `range`, in order, consuming the source.
    fn read_range(self, range: ByteRange) -> RangedStream<Self>
    where
        Self: Sized,
    {
        RangedStream::new(self, range.start(), range.len())
    }
}
