// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use bytes::Bytes;
use http::StatusCode;
use thiserror::Error;

use wirebind_contract::{AuthError, CodecError, PlanBuildError, TransportError};

/// Client-side call failure.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("plan build failed: {0}")]
    Plan(#[from] PlanBuildError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Non-success status with no response sink bound; carries the status
    /// and the raw body.
    #[error("unsuccessful response: status {status}")]
    Unsuccessful { status: StatusCode, body: Bytes },

    #[error("decode failed: {0}")]
    Decode(#[from] CodecError),

    #[error("authorization failed: {0}")]
    Auth(#[from] AuthError),

    #[error("unknown contract or method `{0}`")]
    UnknownMethod(String),

    #[error("argument error: {0}")]
    Argument(String),

    #[error("invalid request: {0}")]
    Request(String),

    #[error("call cancelled")]
    Cancelled,
}

impl ClientError {
    /// The response status, for unsuccessful-response failures.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Unsuccessful { status, .. } => Some(*status),
            _ => None,
        }
    }
}
