use std::collections::HashMap;
use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use http::header::AUTHORIZATION;
use http::request::Parts;

use common::auth::{Principal, ScopeError, ScopedPrincipal};

use super::StorageError;
use crate::state::TokenConfig;
use crate::ServiceState;

/// Bearer tokens the server accepts, each bound to a set of scopes.
#[derive(Debug, Default)]
pub struct TokenRegistry {
    principals: HashMap<String, Arc<ScopedPrincipal>>,
}

impl TokenRegistry {
    pub fn from_config(tokens: &[TokenConfig]) -> Result<Self, ScopeError> {
        let mut registry = Self::default();
        for config in tokens {
            let principal = ScopedPrincipal::parse(config.scopes.as_slice())?;
            registry.insert(config.token.clone(), principal);
        }
        Ok(registry)
    }

    pub fn insert(&mut self, token: impl Into<String>, principal: ScopedPrincipal) {
        self.principals.insert(token.into(), Arc::new(principal));
    }

    pub fn principal(&self, token: &str) -> Option<Arc<dyn Principal>> {
        self.principals
            .get(token)
            .map(|principal| principal.clone() as Arc<dyn Principal>)
    }

    pub fn len(&self) -> usize {
        self.principals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.principals.is_empty()
    }
}

/// The principal behind the request's `Authorization: Bearer` header, if
/// any. A header that is present but unknown is rejected outright.
pub struct Bearer(pub Option<Arc<dyn Principal>>);

fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[async_trait]
impl FromRequestParts<ServiceState> for Bearer {
    type Rejection = StorageError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServiceState,
    ) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(AUTHORIZATION) else {
            return Ok(Bearer(None));
        };
        let token = value
            .to_str()
            .ok()
            .and_then(bearer_token)
            .ok_or(StorageError::InvalidCredentials)?;

        state
            .tokens()
            .principal(token)
            .map(|principal| Bearer(Some(principal)))
            .ok_or(StorageError::InvalidCredentials)
    }
}
