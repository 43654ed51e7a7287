// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Authorization metadata and the token provider capability.
//!
//! A contract may declare an authorization policy: a scheme plus either a
//! templated static value or a pluggable provider resolved per call. The
//! client engine renders these into an `Authorization: <scheme> <value>`
//! header.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("token resolution failed: {0}")]
    Resolution(String),

    #[error("empty authorization value")]
    EmptyValue,
}

/// Capability that yields the credential value for the Authorization header.
/// Implementations may refresh or fetch tokens; the engine awaits them per
/// call.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self) -> Result<String, AuthError>;
}

/// A provider holding a fixed token.
pub struct SharedToken {
    token: String,
}

impl SharedToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for SharedToken {
    async fn token(&self) -> Result<String, AuthError> {
        if self.token.is_empty() {
            return Err(AuthError::EmptyValue);
        }
        Ok(self.token.clone())
    }
}

/// Where the authorization value comes from.
#[derive(Clone)]
pub enum TokenSource {
    /// A static value; `{name}` placeholders expand from call arguments.
    Static(String),
    /// A provider resolved per call.
    Provider(Arc<dyn TokenProvider>),
}

impl std::fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenSource::Static(_) => f.write_str("TokenSource::Static(..)"),
            TokenSource::Provider(_) => f.write_str("TokenSource::Provider(..)"),
        }
    }
}

/// The contract-level authorization policy.
#[derive(Debug, Clone)]
pub struct AuthorizationSpec {
    pub scheme: String,
    pub source: TokenSource,
}

impl AuthorizationSpec {
    pub fn bearer_static(value: impl Into<String>) -> Self {
        Self {
            scheme: "Bearer".to_string(),
            source: TokenSource::Static(value.into()),
        }
    }

    pub fn with_provider(scheme: impl Into<String>, provider: Arc<dyn TokenProvider>) -> Self {
        Self {
            scheme: scheme.into(),
            source: TokenSource::Provider(provider),
        }
    }
}
