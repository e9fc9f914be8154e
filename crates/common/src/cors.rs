use http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_EXPOSE_HEADERS, ACCESS_CONTROL_MAX_AGE,
    ACCESS_CONTROL_REQUEST_HEADERS, ACCESS_CONTROL_REQUEST_METHOD, ORIGIN, VARY,
};
use http::{HeaderMap, HeaderValue, Method};

use crate::error::ErrorKind;

pub const ALLOWED_METHODS: [Method; 4] = [Method::GET, Method::HEAD, Method::PUT, Method::DELETE];

/// Lowercase request headers a cross-origin client may send.
pub const ALLOWED_HEADERS: [&str; 7] = [
    "authorization",
    "content-type",
    "content-length",
    "if-match",
    "if-none-match",
    "origin",
    "x-requested-with",
];

pub const EXPOSED_HEADERS: [&str; 4] = ["ETag", "Content-Length", "Content-Type", "Last-Modified"];

pub const DEFAULT_MAX_AGE_SECS: u64 = 3600;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CorsError {
    #[error("preflight without an Origin header")]
    MissingOrigin,
    #[error("origin not allowed: {0}")]
    OriginNotAllowed(String),
    #[error("preflight without Access-Control-Request-Method")]
    MissingRequestMethod,
    #[error("method not allowed for cross-origin requests: {0}")]
    MethodNotAllowed(String),
    #[error("header not allowed for cross-origin requests: {0}")]
    HeaderNotAllowed(String),
    #[error("preflight target does not exist")]
    TargetMissing,
    #[error("preflight target conflicts with an existing node")]
    TargetConflict,
}

impl CorsError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Forbidden
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigins {
    /// Accept-all mode, answered with `*`.
    Any,
    List(Vec<String>),
}

/// What the preflight's target path resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    Exists,
    Missing,
    Conflict,
}

/// A preflight whose origin, method and headers were accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preflight {
    allow_origin: HeaderValue,
    method: Method,
    max_age_secs: u64,
}

impl Preflight {
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Second half: the target's shape. On success returns the full set of
    /// response headers for a 204; on failure the caller answers 403 with
    /// only `Vary: Origin`.
    ///
    /// A missing target is accepted only when the preflight asks for `PUT`,
    /// since that is how documents get created.
    pub fn target(self, target: TargetState) -> Result<HeaderMap, CorsError> {
        match target {
            TargetState::Exists => {}
            TargetState::Missing if self.method == Method::PUT => {}
            TargetState::Missing => return Err(CorsError::TargetMissing),
            TargetState::Conflict => return Err(CorsError::TargetConflict),
        }

        let mut response = HeaderMap::new();
        vary_origin(&mut response);
        response.insert(ACCESS_CONTROL_ALLOW_ORIGIN, self.allow_origin);
        response.insert(
            ACCESS_CONTROL_ALLOW_METHODS,
            join_header_value(ALLOWED_METHODS.iter().map(Method::as_str)),
        );
        response.insert(ACCESS_CONTROL_ALLOW_HEADERS, join_header_value(ALLOWED_HEADERS));
        response.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from(self.max_age_secs));
        Ok(response)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsPolicy {
    origins: AllowedOrigins,
    max_age_secs: u64,
}

fn normalize_origin(origin: &str) -> String {
    origin.trim().trim_end_matches('/').to_ascii_lowercase()
}

fn join_header_value<I, S>(items: I) -> HeaderValue
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let joined = items
        .into_iter()
        .map(|s| s.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(", ");
    // built from static ASCII lists
    HeaderValue::from_str(&joined).unwrap_or_else(|_| HeaderValue::from_static(""))
}

/// Add `Vary: Origin`; every response from the storage routes carries it.
pub fn vary_origin(headers: &mut HeaderMap) {
    headers.append(VARY, HeaderValue::from_static("Origin"));
}

impl CorsPolicy {
    pub fn new(origins: AllowedOrigins) -> Self {
        Self {
            origins,
            max_age_secs: DEFAULT_MAX_AGE_SECS,
        }
    }

    /// From a configured list, where `*` anywhere means accept-all.
    pub fn from_origins<S: AsRef<str>>(origins: &[S]) -> Self {
        if origins.iter().any(|origin| origin.as_ref().trim() == "*") {
            return Self::new(AllowedOrigins::Any);
        }
        let origins = origins
            .iter()
            .map(|origin| normalize_origin(origin.as_ref()))
            .collect();
        Self::new(AllowedOrigins::List(origins))
    }

    pub fn with_max_age(mut self, secs: u64) -> Self {
        self.max_age_secs = secs;
        self
    }

    pub fn origins(&self) -> &AllowedOrigins {
        &self.origins
    }

    pub fn origin_allowed(&self, origin: &str) -> bool {
        match &self.origins {
            AllowedOrigins::Any => true,
            AllowedOrigins::List(list) => {
                let origin = normalize_origin(origin);
                list.iter().any(|allowed| *allowed == origin)
            }
        }
    }

    /// Check the Origin header, returning the value to echo back.
    fn check_origin(&self, origin: &HeaderValue) -> Result<HeaderValue, CorsError> {
        let raw = origin
            .to_str()
            .map_err(|_| CorsError::OriginNotAllowed(String::from_utf8_lossy(origin.as_bytes()).into_owned()))?;
        if !self.origin_allowed(raw) {
            return Err(CorsError::OriginNotAllowed(raw.to_string()));
        }
        Ok(match self.origins {
            AllowedOrigins::Any => HeaderValue::from_static("*"),
            AllowedOrigins::List(_) => origin.clone(),
        })
    }

    /// The method a preflight asks for, once validated.
    pub fn requested_method(&self, headers: &HeaderMap) -> Result<Method, CorsError> {
        let raw = headers
            .get(ACCESS_CONTROL_REQUEST_METHOD)
            .ok_or(CorsError::MissingRequestMethod)?;
        let raw = raw
            .to_str()
            .map_err(|_| CorsError::MethodNotAllowed(String::from_utf8_lossy(raw.as_bytes()).into_owned()))?;
        let method = Method::from_bytes(raw.trim().as_bytes())
            .map_err(|_| CorsError::MethodNotAllowed(raw.to_string()))?;
        if !ALLOWED_METHODS.contains(&method) {
            return Err(CorsError::MethodNotAllowed(raw.to_string()));
        }
        Ok(method)
    }

    fn check_request_headers(&self, headers: &HeaderMap) -> Result<(), CorsError> {
        for value in headers.get_all(ACCESS_CONTROL_REQUEST_HEADERS) {
            let raw = value
                .to_str()
                .map_err(|_| CorsError::HeaderNotAllowed(String::from_utf8_lossy(value.as_bytes()).into_owned()))?;
            for name in raw.split(',').map(str::trim).filter(|name| !name.is_empty()) {
                let name = name.to_ascii_lowercase();
                if !ALLOWED_HEADERS.contains(&name.as_str()) {
                    return Err(CorsError::HeaderNotAllowed(name));
                }
            }
        }
        Ok(())
    }

    /// First half of a preflight: origin, requested method and requested
    /// headers. Nothing about the target is consulted, so a refused origin
    /// never reaches the tree.
    pub fn preflight(&self, headers: &HeaderMap) -> Result<Preflight, CorsError> {
        let origin = headers.get(ORIGIN).ok_or(CorsError::MissingOrigin)?;
        let allow_origin = self.check_origin(origin)?;
        let method = self.requested_method(headers)?;
        self.check_request_headers(headers)?;
        Ok(Preflight {
            allow_origin,
            method,
            max_age_secs: self.max_age_secs,
        })
    }

    /// Negotiate a non-preflight request. Requests without an Origin are
    /// same-origin and get only `Vary: Origin`.
    pub fn actual(&self, headers: &HeaderMap) -> Result<HeaderMap, CorsError> {
        let mut response = HeaderMap::new();
        vary_origin(&mut response);

        let Some(origin) = headers.get(ORIGIN) else {
            return Ok(response);
        };
        response.insert(ACCESS_CONTROL_ALLOW_ORIGIN, self.check_origin(origin)?);
        response.insert(ACCESS_CONTROL_EXPOSE_HEADERS, join_header_value(EXPOSED_HEADERS));
        Ok(response)
    }
}
