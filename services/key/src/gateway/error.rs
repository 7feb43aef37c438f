//! Mapping of service errors onto HTTP responses.

use crate::error::{ErrorKind, KeyError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;
use uuid::Uuid;

/// Header carrying the correlation id of an internal error.
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

/// HTTP status for an error kind.
#[must_use]
pub const fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::BadParams => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Error kind for an HTTP status, if it is one the gateway produces.
#[must_use]
pub fn kind_for(status: StatusCode) -> Option<ErrorKind> {
    [
        ErrorKind::BadParams,
        ErrorKind::NotFound,
        ErrorKind::Conflict,
        ErrorKind::Internal,
    ]
    .into_iter()
    .find(|kind| status_for(*kind) == status)
}

impl IntoResponse for KeyError {
    fn into_response(self) -> Response {
        let status = status_for(self.kind);

        if self.kind == ErrorKind::Internal {
            // Never expose internal error details
            let correlation_id = Uuid::new_v4().to_string();
            error!(correlation_id = %correlation_id, error = %self, "Internal error");
            return (
                status,
                [(CORRELATION_ID_HEADER, correlation_id)],
                self.public_message().to_string(),
            )
                .into_response();
        }

        (status, self.message).into_response()
    }
}
