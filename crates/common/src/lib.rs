/**
 * Access control.
 *  - Principals and the permission they hold on a path
 *  - The admission decision made before any tree access
 */
pub mod auth;
/**
 * Helper for setting build version information
 *  at compile time.
 */
pub mod build;
/**
 * Cross-origin negotiation for preflight
 *  and actual requests.
 */
pub mod cors;
/**
 * The server state object: node tree, version
 *  engine and content store behind one handle,
 *  plus the locking that keeps them consistent.
 */
pub mod drive;
/**
 * Error taxonomy shared by every layer.
 */
pub mod error;
/**
 * Canonical remote paths.
 */
pub mod path;
/**
 * Maps an HTTP request onto a drive operation
 *  and an outcome the server can render.
 */
pub mod protocol;
/**
 * Serializable export of the tree for restart.
 */
pub mod snapshot;
/**
 * In-memory folder/document hierarchy.
 */
pub mod tree;
/**
 * Content-derived version tags (ETags).
 */
pub mod version;

pub use content_store;

pub mod prelude {
    pub use crate::auth::{AccessError, FixedPrincipal, Permission, Principal, ScopedPrincipal};
    pub use crate::build::build_info;
    pub use crate::cors::{CorsError, CorsPolicy};
    pub use crate::drive::{Conditions, Drive, DriveError, EntityTags};
    pub use crate::error::ErrorKind;
    pub use crate::path::{PathError, RemotePath};
    pub use crate::protocol::{Outcome, ProtocolError, Request};
    pub use crate::snapshot::Snapshot;
    pub use crate::tree::{DocumentInfo, NodeInfo, TreeError};
    pub use crate::version::{Salt, Version, VersionEngine};
}
