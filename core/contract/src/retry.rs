// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Declarative retry policy and its wait-schedule strategy.
//!
//! A policy names the retryable outcomes explicitly (status codes and
//! transport error kinds); nothing outside those sets is ever retried. The
//! wait schedule is an iterator of delays between attempts: fixed, or
//! doubling from an initial wait up to a cap.

use std::collections::BTreeSet;
use std::time::Duration;

use duration_string::DurationString;
use http::StatusCode;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio_retry::strategy::FixedInterval;

use crate::errors::{PlanBuildError, TransportErrorKind};

/// A wait schedule: one delay per retry, in order.
pub trait Strategy {
    fn get_strategy(&self) -> Box<dyn Iterator<Item = Duration> + Send>;
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, first try included.
    max_attempts: usize,

    /// Wait before the first retry.
    #[schemars(with = "String")]
    initial_wait: DurationString,

    /// Upper bound on any single wait.
    #[schemars(with = "String")]
    max_wait: DurationString,

    /// Double the wait after each retry.
    double_wait: bool,

    /// Response status codes that count as a failed attempt.
    retry_statuses: BTreeSet<u16>,

    /// Transport error kinds that count as a failed attempt.
    retry_errors: BTreeSet<TransportErrorKind>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_wait: Duration::from_millis(100).into(),
            max_wait: Duration::from_secs(5).into(),
            double_wait: true,
            retry_statuses: BTreeSet::new(),
            retry_errors: BTreeSet::new(),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    pub fn with_initial_wait(mut self, wait: Duration) -> Self {
        self.initial_wait = wait.into();
        self
    }

    pub fn with_max_wait(mut self, wait: Duration) -> Self {
        self.max_wait = wait.into();
        self
    }

    pub fn with_double_wait(mut self, double: bool) -> Self {
        self.double_wait = double;
        self
    }

    pub fn retry_on_status(mut self, status: u16) -> Self {
        self.retry_statuses.insert(status);
        self
    }

    pub fn retry_on_error(mut self, kind: TransportErrorKind) -> Self {
        self.retry_errors.insert(kind);
        self
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Whether a response with this status counts as a failed attempt.
    pub fn retries_status(&self, status: StatusCode) -> bool {
        self.retry_statuses.contains(&status.as_u16())
    }

    /// Whether a transport error of this kind counts as a failed attempt.
    pub fn retries_error(&self, kind: TransportErrorKind) -> bool {
        self.retry_errors.contains(&kind)
    }

    /// Reject nonsensical policies at registration time.
    pub fn validate(&self, scope: &str) -> Result<(), PlanBuildError> {
        if self.max_attempts == 0 {
            return Err(PlanBuildError::InvalidRetryPolicy {
                scope: scope.to_string(),
                reason: "max_attempts must be at least 1".to_string(),
            });
        }
        if self.retry_statuses.is_empty() && self.retry_errors.is_empty() {
            return Err(PlanBuildError::InvalidRetryPolicy {
                scope: scope.to_string(),
                reason: "no retryable statuses or error kinds declared".to_string(),
            });
        }
        let initial: Duration = self.initial_wait.into();
        let max: Duration = self.max_wait.into();
        if max < initial {
            return Err(PlanBuildError::InvalidRetryPolicy {
                scope: scope.to_string(),
                reason: "max_wait is below initial_wait".to_string(),
            });
        }
        Ok(())
    }
}

impl Strategy for RetryPolicy {
    fn get_strategy(&self) -> Box<dyn Iterator<Item = Duration> + Send> {
        let retries = self.max_attempts.saturating_sub(1);
        let initial: Duration = self.initial_wait.into();
        let max: Duration = self.max_wait.into();

        if self.double_wait {
            // tokio-retry's exponential strategy grows as base^n, not by
            // doubling an initial wait, so the schedule is built directly.
            Box::new(
                std::iter::successors(Some(initial), move |last| {
                    Some(last.saturating_mul(2).min(max))
                })
                .map(move |d| d.min(max))
                .take(retries),
            )
        } else {
            Box::new(FixedInterval::new(initial).take(retries))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doubling_schedule_caps_at_max_wait() {
        let policy = RetryPolicy::new(5)
            .with_initial_wait(Duration::from_millis(100))
            .with_max_wait(Duration::from_millis(300))
            .retry_on_status(502);
        let waits: Vec<Duration> = policy.get_strategy().collect();
        assert_eq!(
            waits,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(300),
                Duration::from_millis(300),
            ]
        );
    }

    #[test]
    fn test_fixed_schedule() {
        let policy = RetryPolicy::new(3)
            .with_initial_wait(Duration::from_millis(50))
            .with_double_wait(false)
            .retry_on_error(TransportErrorKind::Timeout);
        let waits: Vec<Duration> = policy.get_strategy().collect();
        assert_eq!(waits, vec![Duration::from_millis(50); 2]);
    }

    #[test]
    fn test_single_attempt_policy_never_waits() {
        let policy = RetryPolicy::new(1).retry_on_status(502);
        assert_eq!(policy.get_strategy().count(), 0);
    }

    #[test]
    fn test_membership_checks() {
        let policy = RetryPolicy::new(3)
            .retry_on_status(502)
            .retry_on_status(429)
            .retry_on_error(TransportErrorKind::Timeout);
        assert!(policy.retries_status(StatusCode::BAD_GATEWAY));
        assert!(policy.retries_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(!policy.retries_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(policy.retries_error(TransportErrorKind::Timeout));
        assert!(!policy.retries_error(TransportErrorKind::Connect));
    }

    #[test]
    fn test_validation() {
        assert!(RetryPolicy::new(0)
            .retry_on_status(502)
            .validate("contract `X`")
            .is_err());
        assert!(RetryPolicy::new(3).validate("contract `X`").is_err());
        assert!(RetryPolicy::new(3)
            .retry_on_status(502)
            .validate("contract `X`")
            .is_ok());
    }

    #[test]
    fn test_policy_roundtrips_through_serde() {
        let policy = RetryPolicy::new(4)
            .with_initial_wait(Duration::from_millis(250))
            .retry_on_status(502)
            .retry_on_error(TransportErrorKind::Connect);
        let json = serde_json::to_string(&policy).unwrap();
        let back: RetryPolicy = serde_json::from_str(&json).unwrap();
        assert_eq!(back, policy);
    }
}
