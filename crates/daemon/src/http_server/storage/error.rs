use axum::response::{IntoResponse, Response};
use axum::Json;
use http::header::{ALLOW, VARY, WWW_AUTHENTICATE};
use http::StatusCode;

use common::cors::CorsError;
use common::error::ErrorKind;
use common::path::PathError;
use common::protocol::ProtocolError;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("invalid path: {0}")]
    Path(#[from] PathError),
    #[error("invalid {0} header")]
    InvalidHeader(&'static str),
    #[error("invalid bearer token")]
    InvalidCredentials,
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Cors(#[from] CorsError),
}

impl StorageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::Path(_) | StorageError::InvalidHeader(_) => ErrorKind::BadRequest,
            StorageError::InvalidCredentials => ErrorKind::Unauthorized,
            StorageError::Protocol(e) => e.kind(),
            StorageError::Cors(e) => e.kind(),
        }
    }
}

impl IntoResponse for StorageError {
    fn into_response(self) -> Response {
        // a denied origin learns nothing beyond the status
        if let StorageError::Cors(_) = self {
            return (StatusCode::FORBIDDEN, [(VARY, "Origin")]).into_response();
        }

        let kind = self.kind();
        let description = match kind {
            ErrorKind::Io | ErrorKind::ServerError => {
                tracing::error!(error = %self, "storage request failed");
                None
            }
            _ => Some(self.to_string()),
        };

        let body = serde_json::json!({
            "error": kind.message(),
            "description": description,
        });
        let mut response = (kind.status(), Json(body)).into_response();

        if let StorageError::Protocol(e) = &self {
            if let Some(allow) = e.allow() {
                response
                    .headers_mut()
                    .insert(ALLOW, http::HeaderValue::from_static(allow));
            }
        }
        if kind == ErrorKind::Unauthorized {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, http::HeaderValue::from_static("Bearer"));
        }
        response
    }
}
