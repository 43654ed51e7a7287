// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while compiling contract metadata into a binding plan.
///
/// Every variant is a metadata defect: it fires once, at registration time,
/// and is never retried.
#[derive(Error, Debug)]
pub enum PlanBuildError {
    #[error("contract `{0}` declares no methods")]
    EmptyContract(String),

    #[error("method `{0}` carries no route annotation")]
    MissingRoute(String),

    #[error("invalid verb `{verb}` on method `{method}`")]
    InvalidVerb { method: String, verb: String },

    #[error("invalid path template `{template}` on method `{method}`: {reason}")]
    BadTemplate {
        method: String,
        template: String,
        reason: String,
    },

    #[error("placeholder `{name}` in method `{method}` resolves to no bound parameter")]
    UnboundPlaceholder { method: String, name: String },

    #[error("placeholder `{name}` in method `{method}` is claimed by more than one parameter")]
    DuplicatePlaceholder { method: String, name: String },

    #[error("method `{0}` declares more than one body parameter")]
    DuplicateBody(String),

    #[error("body parameter conflicts with {content} content in method `{method}`")]
    BodyConflict { method: String, content: String },

    #[error("method `{method}` declares more than one {kind} binding")]
    DuplicateSingleton { method: String, kind: String },

    #[error("content parameter `{name}` in method `{method}` carries no disposition metadata")]
    MissingDisposition { method: String, name: String },

    #[error("invalid header name `{name}` in `{scope}`")]
    InvalidHeaderName { scope: String, name: String },

    #[error("invalid base path `{base}` on contract `{contract}`: {reason}")]
    BadBasePath {
        contract: String,
        base: String,
        reason: String,
    },

    #[error("retry policy rejected on `{scope}`: {reason}")]
    InvalidRetryPolicy { scope: String, reason: String },

    #[error("fault handler for `{kind}` in method `{method}` has an empty kind path")]
    EmptyFaultKind { method: String, kind: String },
}

/// Coarse classification of a connection-level send failure.
///
/// The retry policy's retryable-error set is expressed in these kinds, so the
/// classification must stay stable across sender implementations.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum TransportErrorKind {
    /// Connection establishment failed.
    Connect,
    /// The request or response did not complete in time.
    Timeout,
    /// The response body could not be read.
    Body,
    /// Any other protocol-level failure.
    Protocol,
}

impl std::fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransportErrorKind::Connect => "connect",
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Body => "body",
            TransportErrorKind::Protocol => "protocol",
        };
        f.write_str(s)
    }
}

/// A connection-level failure from a request sender.
///
/// Retried only when the active retry policy lists its kind; otherwise it
/// propagates to the caller unwrapped.
#[derive(Error, Debug, Clone)]
#[error("transport {kind} error: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Connect, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    pub fn body(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Body, message)
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Protocol, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::timeout("deadline elapsed");
        assert_eq!(err.to_string(), "transport timeout error: deadline elapsed");
    }

    #[test]
    fn test_kind_roundtrip_through_serde() {
        let json = serde_json::to_string(&TransportErrorKind::Connect).unwrap();
        assert_eq!(json, "\"connect\"");
        let back: TransportErrorKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, TransportErrorKind::Connect);
    }
}
