use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use http::header::{HeaderName, CONTENT_TYPE, IF_MATCH, IF_NONE_MATCH};
use http::{HeaderMap, Method, StatusCode};

use common::auth::Principal;
use common::cors::{CorsError, TargetState};
use common::drive::{Conditions, EntityTags};
use common::path::RemotePath;
use common::protocol::{self, Request};
use common::tree::TreeError;

use super::{response, Bearer, StorageError};
use crate::ServiceState;

#[axum::debug_handler(state = ServiceState)]
pub async fn root_handler(
    State(state): State<ServiceState>,
    Bearer(principal): Bearer,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, StorageError> {
    let path = RemotePath::root();
    serve(&state, path, principal.as_deref(), method, &headers, body).await
}

#[axum::debug_handler(state = ServiceState)]
pub async fn handler(
    State(state): State<ServiceState>,
    Path(raw_path): Path<String>,
    Bearer(principal): Bearer,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, StorageError> {
    let path = RemotePath::parse(&format!("/{}", raw_path))?;
    serve(&state, path, principal.as_deref(), method, &headers, body).await
}

async fn serve(
    state: &ServiceState,
    path: RemotePath,
    principal: Option<&dyn Principal>,
    method: Method,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<Response, StorageError> {
    if method == Method::OPTIONS {
        return preflight(state, &path, headers);
    }

    let content_type = header_str(headers, CONTENT_TYPE, "Content-Type")?;
    let request = Request::new(method, path)
        .with_conditions(conditions(headers)?)
        .with_body(content_type, body);

    let outcome = protocol::handle(state.drive(), request, principal).await?;
    Ok(response::render(outcome))
}

/// Preflights are not authorized. The origin is checked before the tree is
/// consulted, and then only for the target's shape.
fn preflight(
    state: &ServiceState,
    path: &RemotePath,
    headers: &HeaderMap,
) -> Result<Response, StorageError> {
    let rejected = |e: CorsError| {
        tracing::debug!(error = %e, path = %path, "preflight rejected");
        StorageError::from(e)
    };

    let negotiated = state.cors().preflight(headers).map_err(rejected)?;
    let target = match state.drive().exists(path) {
        Ok(()) => TargetState::Exists,
        Err(TreeError::NotFound(_)) => TargetState::Missing,
        Err(_) => TargetState::Conflict,
    };
    tracing::trace!(path = %path, method = %negotiated.method(), ?target, "preflight target");

    let cors_headers = negotiated.target(target).map_err(rejected)?;
    Ok((StatusCode::NO_CONTENT, cors_headers).into_response())
}

fn header_str<'a>(
    headers: &'a HeaderMap,
    name: HeaderName,
    label: &'static str,
) -> Result<Option<&'a str>, StorageError> {
    headers
        .get(name)
        .map(|value| value.to_str().map_err(|_| StorageError::InvalidHeader(label)))
        .transpose()
}

/// Multiple header lines are folded into one list.
fn entity_tags(
    headers: &HeaderMap,
    name: HeaderName,
    label: &'static str,
) -> Result<Option<EntityTags>, StorageError> {
    let values = headers
        .get_all(name)
        .iter()
        .map(|value| value.to_str().map_err(|_| StorageError::InvalidHeader(label)))
        .collect::<Result<Vec<_>, _>>()?;

    if values.is_empty() {
        return Ok(None);
    }
    Ok(Some(EntityTags::parse(&values.join(","))))
}

fn conditions(headers: &HeaderMap) -> Result<Conditions, StorageError> {
    Ok(Conditions {
        if_match: entity_tags(headers, IF_MATCH, "If-Match")?,
        if_none_match: entity_tags(headers, IF_NONE_MATCH, "If-None-Match")?,
    })
}
