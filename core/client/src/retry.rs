// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! The retry loop around request sending.
//!
//! Retry only happens under a declared policy; the loop is
//! `tokio_retry::RetryIf` driven by the policy's wait schedule. A response
//! whose status is in the retryable set rides the error channel internally
//! so the loop can retry it; when attempts run out that final response is
//! unwrapped and surfaced as the call's response, leaving the decode stage
//! to apply the usual status rules. A transport error outside the retryable
//! kind set propagates on the spot, unwrapped.

use std::sync::Arc;

use tokio_retry::RetryIf;

use wirebind_contract::{
    CompletionMode, RetryPolicy, Strategy, TransportError, WireRequest, WireResponse,
};

use crate::sender::RequestSender;

/// Internal attempt outcome: either kind of retryable failure.
enum AttemptError {
    Status(WireResponse),
    Transport(TransportError),
}

pub(crate) async fn send_with_policy(
    sender: &Arc<dyn RequestSender>,
    request: WireRequest,
    mode: CompletionMode,
    policy: Option<&RetryPolicy>,
) -> Result<WireResponse, TransportError> {
    let Some(policy) = policy else {
        return sender.send(request, mode).await;
    };

    let attempt = || {
        let sender = Arc::clone(sender);
        let request = request.clone();
        async move {
            match sender.send(request, mode).await {
                Ok(response) if policy.retries_status(response.status) => {
                    tracing::debug!(status = %response.status, "retryable response status");
                    Err(AttemptError::Status(response))
                }
                Ok(response) => Ok(response),
                Err(error) => Err(AttemptError::Transport(error)),
            }
        }
    };

    let retryable = |error: &AttemptError| match error {
        AttemptError::Status(_) => true,
        AttemptError::Transport(e) => policy.retries_error(e.kind),
    };

    match RetryIf::spawn(policy.get_strategy(), attempt, retryable).await {
        Ok(response) => Ok(response),
        // attempts exhausted on a retryable status: the final response is
        // still the call's response
        Err(AttemptError::Status(response)) => Ok(response),
        Err(AttemptError::Transport(error)) => Err(error),
    }
}
