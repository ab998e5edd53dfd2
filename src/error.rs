use std::io;
use std::path::PathBuf;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum_extra::TypedHeader;
use axum_extra::headers::ContentRange;

use crate::RangeSpec;

/// Why a `Range` header could not be honoured. Both variants end in a 416.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RangeError {
    #[error("malformed range header {0:?}")]
    Malformed(String),

    #[error("range {spec} is not satisfiable for a resource of {total_size} bytes")]
    NotSatisfiable { spec: RangeSpec, total_size: u64 },
}

/// Error type indicating that the requested range was not satisfiable.
/// Implements [`IntoResponse`] as a bodiless 416 with
/// `Content-Range: bytes */<size>`.
#[derive(Debug, Clone)]
pub struct RangeNotSatisfiable(pub ContentRange);

impl RangeNotSatisfiable {
    pub fn for_size(total_size: u64) -> Self {
        RangeNotSatisfiable(ContentRange::unsatisfied_bytes(total_size))
    }
}

impl IntoResponse for RangeNotSatisfiable {
    fn into_response(self) -> Response {
        let status = StatusCode::RANGE_NOT_SATISFIABLE;
        let header = TypedHeader(self.0);
        (status, header, ()).into_response()
    }
}

/// Failure to open a backing file for serving.
#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("no such resource: {}", .0.display())]
    NotFound(PathBuf),

    #[error("not a regular file: {}", .0.display())]
    NotAFile(PathBuf),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl IntoResponse for SourceError {
    fn into_response(self) -> Response {
        match self {
            SourceError::NotFound(_) | SourceError::NotAFile(_) => {
                (StatusCode::NOT_FOUND, "Not found").into_response()
            }
            SourceError::Io(err) => {
                tracing::error!(error = %err, "failed to open media source");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}
