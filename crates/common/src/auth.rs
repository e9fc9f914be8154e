//! # Authorization
//!
//! A request is admitted or denied before the tree is touched. The decision
//! depends on three things only: the request method, the target path and
//! the permission the presented [`Principal`] holds on that path.
//!
//! ## Public documents
//!
//! A document whose first path segment is `public/` is readable by anyone,
//! including anonymous clients. Folders under `public/` are not: listing
//! them still needs read permission.
//!
//! ## Scopes
//!
//! [`ScopedPrincipal`] carries scopes of the form `category:r` or
//! `category:rw`. The category is matched against the first path segment,
//! looking through a leading `public/`, and `*` matches every path.

use std::fmt;
use std::str::FromStr;

use http::Method;
use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;
use crate::path::RemotePath;

/// Access a principal holds on a path. Ordered from least to most.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Public documents only.
    None,
    /// `GET` and `HEAD`.
    Read,
    /// Every method.
    ReadWrite,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permission::None => write!(f, "none"),
            Permission::Read => write!(f, "r"),
            Permission::ReadWrite => write!(f, "rw"),
        }
    }
}

/// An authenticated identity. Stateless: the answer only depends on the
/// path.
pub trait Principal: Send + Sync + fmt::Debug {
    fn permission_for(&self, path: &RemotePath) -> Permission;
}

/// The same permission on every path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedPrincipal(pub Permission);

impl Principal for FixedPrincipal {
    fn permission_for(&self, _path: &RemotePath) -> Permission {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScopeError {
    #[error("scope must be <category>:<r|rw>: {0}")]
    Malformed(String),
    #[error("unknown access level in scope: {0}")]
    UnknownAccess(String),
}

/// Wildcard category.
pub const ANY_CATEGORY: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Scope {
    pub category: String,
    pub permission: Permission,
}

impl Scope {
    fn covers(&self, path: &RemotePath) -> bool {
        self.category == ANY_CATEGORY || path.category() == Some(self.category.as_str())
    }
}

impl FromStr for Scope {
    type Err = ScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (category, access) = s
            .split_once(':')
            .ok_or_else(|| ScopeError::Malformed(s.to_string()))?;
        if category.is_empty() || category.contains('/') {
            return Err(ScopeError::Malformed(s.to_string()));
        }
        let permission = match access {
            "r" => Permission::Read,
            "rw" => Permission::ReadWrite,
            _ => return Err(ScopeError::UnknownAccess(s.to_string())),
        };
        Ok(Self {
            category: category.to_string(),
            permission,
        })
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.category, self.permission)
    }
}

/// Principal holding a set of category scopes, as granted to a bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedPrincipal {
    scopes: Vec<Scope>,
}

impl ScopedPrincipal {
    pub fn new(scopes: Vec<Scope>) -> Self {
        Self { scopes }
    }

    pub fn parse<S: AsRef<str>>(scopes: &[S]) -> Result<Self, ScopeError> {
        let scopes = scopes
            .iter()
            .map(|scope| scope.as_ref().parse())
            .collect::<Result<_, _>>()?;
        Ok(Self::new(scopes))
    }

    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }
}

impl Principal for ScopedPrincipal {
    fn permission_for(&self, path: &RemotePath) -> Permission {
        self.scopes
            .iter()
            .filter(|scope| scope.covers(path))
            .map(|scope| scope.permission)
            .max()
            .unwrap_or(Permission::None)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    #[error("no credentials presented for {0}")]
    Unauthorized(RemotePath),
    #[error("insufficient permission for {0}")]
    Forbidden(RemotePath),
}

impl AccessError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AccessError::Unauthorized(_) => ErrorKind::Unauthorized,
            AccessError::Forbidden(_) => ErrorKind::Forbidden,
        }
    }
}

fn is_read(method: &Method) -> bool {
    *method == Method::GET || *method == Method::HEAD
}

/// What `principal` holds on `path`, before the public-read rule.
pub fn permission(path: &RemotePath, principal: Option<&dyn Principal>) -> Permission {
    principal
        .map(|principal| principal.permission_for(path))
        .unwrap_or(Permission::None)
}

/// 401 for anonymous callers, 403 for known ones.
pub fn denial(path: &RemotePath, principal: Option<&dyn Principal>) -> AccessError {
    match principal {
        None => AccessError::Unauthorized(path.clone()),
        Some(_) => AccessError::Forbidden(path.clone()),
    }
}

/// Admit or deny `method` on `path`.
pub fn authorize(
    method: &Method,
    path: &RemotePath,
    principal: Option<&dyn Principal>,
) -> Result<(), AccessError> {
    let admitted = match permission(path, principal) {
        Permission::ReadWrite => true,
        Permission::Read => is_read(method),
        Permission::None => path.is_public() && is_read(method),
    };

    if admitted {
        return Ok(());
    }
    Err(denial(path, principal))
}
