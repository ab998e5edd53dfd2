use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::response::{IntoResponse, Response};
use bytes::{Bytes, BytesMut};
use futures::Stream;
use http_body::{Body, Frame, SizeHint};
use pin_project::pin_project;
use tokio::io::ReadBuf;

use crate::ByteRangeSource;

/// Read buffer size for incrementally streamed responses.
pub const IO_BUFFER_SIZE: usize = 64 * 1024;

/// Response body stream over one byte window of a [`ByteRangeSource`].
/// Implements [`Stream`], [`Body`], and [`IntoResponse`].
///
/// Bytes are yielded in ascending offset order, exactly `length` of them.
/// Dropping the stream drops the source, which closes any file handle.
#[pin_project]
pub struct RangedStream<B> {
    state: StreamState,
    length: u64,
    buffer_size: usize,
    #[pin]
    body: B,
}

impl<B: ByteRangeSource> RangedStream<B> {
    pub(crate) fn new(body: B, start: u64, length: u64) -> Self {
        Self::with_buffer_size(body, start, length, IO_BUFFER_SIZE)
    }

    /// Like [`RangedStream::new`], reading up to `buffer_size` bytes per chunk.
    pub(crate) fn with_buffer_size(body: B, start: u64, length: u64, buffer_size: usize) -> Self {
        RangedStream {
            state: StreamState::Seek { start },
            length,
            buffer_size: buffer_size.max(1),
            body,
        }
    }

    /// Total number of bytes this stream yields.
    pub fn len(&self) -> u64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}

impl<B> std::fmt::Debug for RangedStream<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangedStream")
            .field("state", &self.state)
            .field("length", &self.length)
            .finish()
    }
}

#[derive(Debug)]
enum StreamState {
    Seek { start: u64 },
    Seeking { remaining: u64 },
    Reading { buffer: BytesMut, remaining: u64 },
    Done,
}

impl<B: ByteRangeSource + Send + 'static> IntoResponse for RangedStream<B> {
    fn into_response(self) -> Response {
        Response::new(axum::body::Body::new(self))
    }
}

impl<B: ByteRangeSource> Body for RangedStream<B> {
    type Data = Bytes;
    type Error = io::Error;

    fn size_hint(&self) -> SizeHint {
        SizeHint::with_exact(self.length)
    }

    fn is_end_stream(&self) -> bool {
        matches!(self.state, StreamState::Done) || self.length == 0
    }

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>)
        -> Poll<Option<io::Result<Frame<Bytes>>>>
    {
        self.poll_next(cx).map(|item| item.map(|result| result.map(Frame::data)))
    }
}

impl<B: ByteRangeSource> Stream for RangedStream<B> {
    type Item = io::Result<Bytes>;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>
    ) -> Poll<Option<io::Result<Bytes>>> {
        let mut this = self.project();

        if let StreamState::Seek { start } = *this.state {
            if *this.length == 0 {
                *this.state = StreamState::Done;
                return Poll::Ready(None);
            }
            match this.body.as_mut().start_seek(start) {
                Err(e) => { return Poll::Ready(Some(Err(fail(this.state, e)))); }
                Ok(()) => {
                    let remaining = *this.length;
                    *this.state = StreamState::Seeking { remaining };
                }
            }
        }

        if let StreamState::Seeking { remaining } = *this.state {
            match this.body.as_mut().poll_complete(cx) {
                Poll::Pending => { return Poll::Pending; }
                Poll::Ready(Err(e)) => { return Poll::Ready(Some(Err(fail(this.state, e)))); }
                Poll::Ready(Ok(())) => {
                    let buffer = allocate_buffer(*this.buffer_size, remaining);
                    *this.state = StreamState::Reading { buffer, remaining };
                }
            }
        }

        if let StreamState::Reading { buffer, remaining } = this.state {
            if *remaining == 0 {
                *this.state = StreamState::Done;
                return Poll::Ready(None);
            }

            let uninit = buffer.spare_capacity_mut();

            // calculate max number of bytes to read in this iteration, the
            // smaller of the buffer size and the number of bytes remaining
            let nbytes = std::cmp::min(
                uninit.len(),
                usize::try_from(*remaining).unwrap_or(usize::MAX),
            );

            let mut read_buf = ReadBuf::uninit(&mut uninit[0..nbytes]);

            return match this.body.as_mut().poll_read(cx, &mut read_buf) {
                Poll::Pending => Poll::Pending,
                Poll::Ready(Err(e)) => Poll::Ready(Some(Err(fail(this.state, e)))),
                Poll::Ready(Ok(())) => match read_buf.filled().len() {
                    0 => {
                        let missing = *remaining;
                        let e = io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            format!("source ended with {missing} bytes of the range unsent"),
                        );
                        Poll::Ready(Some(Err(fail(this.state, e))))
                    }
                    n => {
                        // SAFETY: poll_read has filled the buffer with `n`
                        // additional bytes. `buffer.len` should always be
                        // 0 here, but include it for rigorous correctness
                        unsafe { buffer.set_len(buffer.len() + n); }

                        // n <= remaining because of the cmp::min above
                        *remaining -= n as u64;

                        // hand out the filled bytes and keep reading into
                        // the rest of the same allocation after a short read
                        let chunk = buffer.split_to(n).freeze();
                        if buffer.capacity() == 0 {
                            *buffer = allocate_buffer(*this.buffer_size, *remaining);
                        }
                        Poll::Ready(Some(Ok(chunk)))
                    }
                },
            };
        }

        Poll::Ready(None)
    }
}

/// Ends the stream after an I/O error. Nothing is retried; the client sees
/// a truncated body and may re-request.
fn fail(state: &mut StreamState, e: io::Error) -> io::Error {
    tracing::warn!(error = %e, "media stream aborted");
    *state = StreamState::Done;
    e
}

fn allocate_buffer(buffer_size: usize, remaining: u64) -> BytesMut {
    let capacity = std::cmp::min(buffer_size, usize::try_from(remaining).unwrap_or(usize::MAX));
    BytesMut::with_capacity(capacity)
}
