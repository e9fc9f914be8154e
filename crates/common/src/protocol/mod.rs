//! Protocol decisions.
//!
//! Turns one storage request into a drive operation and an [`Outcome`] the
//! server renders. Nothing here knows about sockets or response bodies; the
//! daemon maps outcomes and [`ProtocolError::kind`] onto HTTP.
//!
//! Order of evaluation:
//!
//! 1. path shape picks folder or document semantics
//! 2. authorization
//! 3. method dispatch, with conditional headers checked against the target's
//!    current tag (`If-Match` before `If-None-Match`)

mod listing;

use std::fmt;

use bytes::Bytes;
use http::Method;

use content_store::ByteStream;

use crate::auth::{self, AccessError, Permission, Principal};
use crate::drive::{Conditions, Drive, DriveError};
use crate::error::ErrorKind;
use crate::path::RemotePath;
use crate::tree::{DocumentInfo, Listing};
use crate::version::Version;

pub use listing::{
    FolderDescription, ItemDescription, FOLDER_DESCRIPTION_CONTEXT, FOLDER_DESCRIPTION_MIME,
};

/// Used when a `PUT` carries no `Content-Type`.
pub const DEFAULT_MIME: &str = "application/octet-stream";

/// `Allow` header for folder targets.
pub const FOLDER_ALLOW: &str = "GET, HEAD, OPTIONS";
/// `Allow` header for document targets.
pub const DOCUMENT_ALLOW: &str = "GET, HEAD, PUT, DELETE, OPTIONS";

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error(transparent)]
    Drive(#[from] DriveError),
    #[error("method {method} not allowed on {path}")]
    MethodNotAllowed { method: Method, path: RemotePath },
    #[error("precondition failed: {0}")]
    PreconditionFailed(RemotePath),
}

impl ProtocolError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProtocolError::Access(e) => e.kind(),
            ProtocolError::Drive(e) => e.kind(),
            ProtocolError::MethodNotAllowed { .. } => ErrorKind::MethodNotAllowed,
            ProtocolError::PreconditionFailed(_) => ErrorKind::PreconditionFailed,
        }
    }

    /// Value for the `Allow` header of a 405.
    pub fn allow(&self) -> Option<&'static str> {
        match self {
            ProtocolError::MethodNotAllowed { path, .. } if path.is_folder() => Some(FOLDER_ALLOW),
            ProtocolError::MethodNotAllowed { .. } => Some(DOCUMENT_ALLOW),
            _ => None,
        }
    }
}

/// A storage request, already stripped of transport details.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub path: RemotePath,
    pub conditions: Conditions,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl Request {
    pub fn new(method: Method, path: RemotePath) -> Self {
        Self {
            method,
            path,
            conditions: Conditions::default(),
            content_type: None,
            body: Bytes::new(),
        }
    }

    pub fn with_conditions(mut self, conditions: Conditions) -> Self {
        self.conditions = conditions;
        self
    }

    pub fn with_body(mut self, content_type: Option<&str>, body: impl Into<Bytes>) -> Self {
        self.content_type = content_type.map(str::to_string);
        self.body = body.into();
        self
    }
}

pub enum Outcome {
    /// 304, no body.
    NotModified { version: Version },
    /// Folder description.
    Listing(Listing),
    /// Document headers, with the content stream for `GET`.
    Document {
        info: DocumentInfo,
        body: Option<ByteStream>,
    },
    /// 201 when `created`, else 200.
    Stored { version: Version, created: bool },
    /// 200 carrying the tag the document had.
    Deleted { version: Version },
}

impl fmt::Debug for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::NotModified { version } => f
                .debug_struct("NotModified")
                .field("version", version)
                .finish(),
            Outcome::Listing(listing) => f.debug_tuple("Listing").field(listing).finish(),
            Outcome::Document { info, body } => f
                .debug_struct("Document")
                .field("info", info)
                .field("streaming", &body.is_some())
                .finish(),
            Outcome::Stored { version, created } => f
                .debug_struct("Stored")
                .field("version", version)
                .field("created", created)
                .finish(),
            Outcome::Deleted { version } => {
                f.debug_struct("Deleted").field("version", version).finish()
            }
        }
    }
}

impl Outcome {
    /// Tag to send as `ETag`.
    pub fn version(&self) -> Version {
        match self {
            Outcome::NotModified { version }
            | Outcome::Stored { version, .. }
            | Outcome::Deleted { version } => *version,
            Outcome::Listing(listing) => listing.version,
            Outcome::Document { info, .. } => info.version,
        }
    }
}

/// Check read preconditions. `Ok(true)` means answer 304.
fn check_read(conditions: &Conditions, path: &RemotePath, current: &Version) -> Result<bool, ProtocolError> {
    if conditions.if_match_fails(Some(current)) {
        return Err(ProtocolError::PreconditionFailed(path.clone()));
    }
    Ok(conditions.if_none_match_hits(Some(current)))
}

/// Decide and execute one storage request.
pub async fn handle(
    drive: &Drive,
    request: Request,
    principal: Option<&dyn Principal>,
) -> Result<Outcome, ProtocolError> {
    let Request {
        method,
        path,
        conditions,
        content_type,
        body,
    } = request;

    auth::authorize(&method, &path, principal)?;

    let folder = path.is_folder();
    match method {
        Method::GET | Method::HEAD if folder => {
            let listing = drive.list(&path).await?;
            if check_read(&conditions, &path, &listing.version)? {
                return Ok(Outcome::NotModified {
                    version: listing.version,
                });
            }
            Ok(Outcome::Listing(listing))
        }
        Method::GET | Method::HEAD => {
            let info = match drive.document(&path).await {
                // public reads cover documents only; a folder here stays hidden
                Err(e)
                    if e.kind() == ErrorKind::Conflict
                        && auth::permission(&path, principal) == Permission::None =>
                {
                    return Err(auth::denial(&path, principal).into());
                }
                other => other?,
            };
            if check_read(&conditions, &path, &info.version)? {
                return Ok(Outcome::NotModified {
                    version: info.version,
                });
            }
            if method == Method::HEAD {
                return Ok(Outcome::Document { info, body: None });
            }
            let (opened, body) = drive.open(&info).await?;
            // a concurrent write may have replaced what was checked
            if opened.version != info.version && check_read(&conditions, &path, &opened.version)? {
                return Ok(Outcome::NotModified {
                    version: opened.version,
                });
            }
            Ok(Outcome::Document {
                info: opened,
                body: Some(body),
            })
        }
        Method::PUT if !folder => {
            let mime = content_type
                .as_deref()
                .map(str::trim)
                .filter(|mime| !mime.is_empty())
                .unwrap_or(DEFAULT_MIME);
            let stored = drive
                .store_document(&path, body, mime, &conditions)
                .await?;
            Ok(Outcome::Stored {
                version: stored.version,
                created: stored.created,
            })
        }
        Method::DELETE if !folder => {
            let version = drive.remove_document(&path, &conditions).await?;
            Ok(Outcome::Deleted { version })
        }
        _ => Err(ProtocolError::MethodNotAllowed { method, path }),
    }
}
