// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Wire-level request and response shapes shared by both adapters.
//!
//! [`WireRequest`]/[`WireResponse`] are what the client engine hands to a
//! request sender; [`HostRequest`]/[`HostResponse`] are what a hosting web
//! framework hands to (and receives from) the server dispatch adapter. All
//! four are plain data so they can cross the sender and host seams without
//! dragging a transport dependency along.

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};

/// How much of the response the sender must have before returning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompletionMode {
    /// The full body is buffered before the call returns.
    #[default]
    Buffered,
    /// The sender may return once the status line and headers are available;
    /// senders that cannot stream fall back to buffering.
    HeadersOnly,
}

/// A fully built outbound request, ready for a sender.
#[derive(Debug, Clone)]
pub struct WireRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub timeout: Option<Duration>,
}

impl WireRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
            timeout: None,
        }
    }

    /// The request's `content-type` header, if set.
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }
}

/// A buffered inbound response.
#[derive(Debug, Clone)]
pub struct WireResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl WireResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

/// An inbound request as the host framework presents it to the adapter.
///
/// Route values are the host's own template-match output; the adapter reads
/// headers and the body directly.
#[derive(Debug, Clone, Default)]
pub struct HostRequest {
    pub route: HashMap<String, String>,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HostRequest {
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }
}

/// The adapter's answer: a status plus an optional payload.
#[derive(Debug, Clone)]
pub struct HostResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl HostResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn with_payload(mut self, body: impl Into<Bytes>, content_type: &str) -> Self {
        self.body = Some(body.into());
        if let Ok(value) = http::HeaderValue::from_str(content_type) {
            self.headers.insert(http::header::CONTENT_TYPE, value);
        }
        self
    }
}
