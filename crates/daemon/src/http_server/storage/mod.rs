//! remoteStorage routes.
//!
//! Every method on `{prefix}/` and `{prefix}/*path` lands in one handler;
//! the protocol layer in `common` decides what it means. This module only
//! translates headers in and outcomes out.

use axum::middleware;
use axum::routing::any;
use axum::Router;

mod auth;
mod cors;
mod error;
mod handler;
mod response;

pub use auth::{Bearer, TokenRegistry};
pub use error::StorageError;

use crate::ServiceState;

pub fn router(state: ServiceState) -> Router<ServiceState> {
    let prefix = state.storage_prefix().to_string();
    Router::new()
        .route(&format!("{}/", prefix), any(handler::root_handler))
        .route(&format!("{}/*path", prefix), any(handler::handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            cors::negotiate,
        ))
        .with_state(state)
}
