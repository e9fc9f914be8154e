use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;
use serde::Serialize;

use common::build::BuildInfo;
use common::prelude::build_info;

use crate::ServiceState;

/// Build details plus where storage is mounted, so a client can find the
/// storage root from the status endpoint alone.
#[derive(Debug, Serialize)]
pub struct VersionResponse<'a> {
    #[serde(flatten)]
    pub build: BuildInfo,
    pub storage_prefix: &'a str,
}

#[tracing::instrument(skip(state))]
pub async fn handler(State(state): State<ServiceState>) -> Response {
    let body = VersionResponse {
        build: build_info(),
        storage_prefix: state.storage_prefix(),
    };
    (StatusCode::OK, Json(body)).into_response()
}
