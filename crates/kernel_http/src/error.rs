//! Converts [`KernelError`] into an HTTP response, the one seam where the
//! status codes named in spec §6.1/§7 are actually chosen. Everywhere else
//! in this crate only handles the happy path or a handful of `match`ed
//! error variants it needs to special-case (`AlreadyExists`,
//! `VersionAlreadySet`) before falling back to this conversion.

use axum::{
    http::StatusCode,
    response::{
        IntoResponse,
        Response,
    },
    Json,
};
use serde_json::json;

use errors::KernelError;

pub struct ApiError(pub KernelError);

impl From<KernelError> for ApiError {
    fn from(err: KernelError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.0.http_status();
        if status == StatusCode::NO_CONTENT {
            return status.into_response();
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}
