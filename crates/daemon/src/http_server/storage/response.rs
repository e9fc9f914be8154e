use axum::body::Body;
use axum::response::{IntoResponse, Response};
use axum::Json;
use http::header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, ETAG, LAST_MODIFIED};
use http::StatusCode;

use common::protocol::{FolderDescription, Outcome, FOLDER_DESCRIPTION_MIME};

const NO_CACHE: &str = "no-cache";

/// Turn a protocol outcome into the HTTP response clients expect.
pub fn render(outcome: Outcome) -> Response {
    match outcome {
        Outcome::NotModified { version } => {
            (StatusCode::NOT_MODIFIED, [(ETAG, version.etag())]).into_response()
        }
        Outcome::Listing(listing) => (
            StatusCode::OK,
            [
                (ETAG, listing.version.etag()),
                (CONTENT_TYPE, FOLDER_DESCRIPTION_MIME.to_string()),
                (CACHE_CONTROL, NO_CACHE.to_string()),
            ],
            Json(FolderDescription::from(&listing)),
        )
            .into_response(),
        Outcome::Document { info, body } => {
            let headers = [
                (ETAG, info.version.etag()),
                (CONTENT_TYPE, info.mime.clone()),
                (CONTENT_LENGTH, info.length.to_string()),
                (LAST_MODIFIED, info.last_modified_http()),
                (CACHE_CONTROL, NO_CACHE.to_string()),
            ];
            let body = match body {
                Some(stream) => Body::from_stream(stream),
                None => Body::empty(),
            };
            (StatusCode::OK, headers, body).into_response()
        }
        Outcome::Stored { version, created } => {
            let status = if created {
                StatusCode::CREATED
            } else {
                StatusCode::OK
            };
            (status, [(ETAG, version.etag())]).into_response()
        }
        Outcome::Deleted { version } => (StatusCode::OK, [(ETAG, version.etag())]).into_response(),
    }
}
