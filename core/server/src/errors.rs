// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

use wirebind_contract::PlanBuildError;

/// Adapter construction and registration failures. Per-request failures
/// never surface here: the adapter always answers with a response.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("plan build failed: {0}")]
    Plan(#[from] PlanBuildError),

    #[error("contract `{0}` is not registered")]
    UnknownContract(String),

    #[error("route conflict: {verb} {path} is already bound")]
    RouteConflict { verb: String, path: String },
}
