// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! The request sender seam and its reqwest-backed default.
//!
//! Everything above this trait is transport-free; everything below it is
//! reqwest. Tests and embeddings swap in their own senders (an in-memory
//! sender can dispatch straight into a server adapter).

use async_trait::async_trait;

use wirebind_contract::{CompletionMode, TransportError, WireRequest, WireResponse};

/// Sends one built request and returns the buffered response.
///
/// Senders return `Ok` for any HTTP status; a [`TransportError`] means the
/// exchange itself failed.
#[async_trait]
pub trait RequestSender: Send + Sync {
    async fn send(
        &self,
        request: WireRequest,
        mode: CompletionMode,
    ) -> Result<WireResponse, TransportError>;
}

/// The default sender over a shared `reqwest` client.
pub struct HttpSender {
    client: reqwest::Client,
}

impl HttpSender {
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| TransportError::connect(e.to_string()))?;
        Ok(Self { client })
    }

    /// Wrap an already-configured reqwest client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn classify(error: &reqwest::Error) -> TransportError {
        if error.is_timeout() {
            TransportError::timeout(error.to_string())
        } else if error.is_connect() {
            TransportError::connect(error.to_string())
        } else if error.is_body() || error.is_decode() {
            TransportError::body(error.to_string())
        } else {
            TransportError::protocol(error.to_string())
        }
    }
}

#[async_trait]
impl RequestSender for HttpSender {
    async fn send(
        &self,
        request: WireRequest,
        _mode: CompletionMode,
    ) -> Result<WireResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.as_str())
            .headers(request.headers.clone());
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(body) = request.body.clone() {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| Self::classify(&e))?;
        let status = response.status();
        let headers = response.headers().clone();
        // reqwest exposes no headers-first handle compatible with a buffered
        // body seam, so both completion modes buffer here.
        let body = response.bytes().await.map_err(|e| Self::classify(&e))?;

        Ok(WireResponse {
            status,
            headers,
            body,
        })
    }
}
