use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use http::Method;

use super::StorageError;
use crate::ServiceState;

/// Apply the origin policy to non-preflight requests. Preflights are
/// answered by the handler since they need the target's state.
pub async fn negotiate(
    State(state): State<ServiceState>,
    request: Request,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS {
        return next.run(request).await;
    }

    match state.cors().actual(request.headers()) {
        Ok(cors_headers) => {
            let mut response = next.run(request).await;
            response.headers_mut().extend(cors_headers);
            response
        }
        Err(e) => {
            tracing::debug!(error = %e, "cross-origin request rejected");
            StorageError::from(e).into_response()
        }
    }
}
