use http::StatusCode;

/// Coarse classification every layer's error reduces to.
///
/// The HTTP layer only ever looks at the kind, so internal details
/// (storage refs, backend messages) never reach a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed path or header
    BadRequest,
    /// Path does not resolve to any node
    NotFound,
    /// Path shape contradicts an existing node, or an ancestor is a document
    Conflict,
    /// `If-Match` / `If-None-Match` check failed
    PreconditionFailed,
    /// Method not applicable to the target kind
    MethodNotAllowed,
    /// No principal presented
    Unauthorized,
    /// Principal presented but lacks permission
    Forbidden,
    /// Content store failure or store/tree desynchronization
    Io,
    /// Anything unclassified
    ServerError,
}

impl ErrorKind {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::PreconditionFailed => StatusCode::PRECONDITION_FAILED,
            ErrorKind::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::Io | ErrorKind::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short human-readable message safe to send to clients.
    pub fn message(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "bad request",
            ErrorKind::NotFound => "not found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::PreconditionFailed => "precondition failed",
            ErrorKind::MethodNotAllowed => "method not allowed",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::Io => "storage failure",
            ErrorKind::ServerError => "internal server error",
        }
    }
}
