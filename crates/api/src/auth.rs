//! Identity verification boundary.
//!
//! The checkout core consumes an external identity verifier: a bearer
//! credential goes in, a trusted customer id comes out. The real
//! verifier lives outside this system; [`StaticTokenVerifier`] is the
//! in-memory stand-in used for development and tests.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use axum::http::HeaderMap;
use common::CustomerId;
use thiserror::Error;

/// Authentication failures, mapped to 401/403 at the HTTP boundary.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No bearer credential was presented.
    #[error("Missing bearer credential")]
    MissingCredential,

    /// A credential was presented but did not resolve to a customer.
    #[error("Invalid bearer credential")]
    InvalidCredential,
}

/// Resolves a bearer credential to a customer id.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, bearer: &str) -> Result<CustomerId, AuthError>;
}

/// In-memory token → customer map for development and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenVerifier {
    tokens: Arc<RwLock<HashMap<String, CustomerId>>>,
}

impl StaticTokenVerifier {
    /// Creates a verifier with no registered tokens.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a token that resolves to the given customer.
    pub fn register(&self, token: impl Into<String>, customer_id: CustomerId) {
        self.tokens
            .write()
            .expect("token map poisoned")
            .insert(token.into(), customer_id);
    }
}

#[async_trait]
impl IdentityVerifier for StaticTokenVerifier {
    async fn verify(&self, bearer: &str) -> Result<CustomerId, AuthError> {
        self.tokens
            .read()
            .expect("token map poisoned")
            .get(bearer)
            .copied()
            .ok_or(AuthError::InvalidCredential)
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingCredential)?;

    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingCredential)
}
