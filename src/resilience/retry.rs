//! Bounded retry with a per-attempt timeout.
//!
//! The loop is an explicit state machine: [`transition`] is a pure function
//! over [`RetryState`], and [`RetryPolicy::call_with_retry`] only drives it,
//! running the attempts and sleeping through backoff.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::ErrorKind;
use crate::{Error, Result};

/// Configuration for retry logic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    #[serde(with = "crate::config::duration_secs")]
    pub timeout_per_attempt: Duration,
    /// Constant delay between attempts.
    #[serde(with = "crate::config::duration_secs")]
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            timeout_per_attempt: Duration::from_secs(15),
            backoff: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    /// Attempt number `attempt` (1-based) is in flight.
    Attempting { attempt: u32 },
    /// Attempt `attempt` failed; waiting before the next one.
    Backoff { attempt: u32 },
    Succeeded { attempts: u32 },
    Exhausted { attempts: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryEvent {
    AttemptSucceeded,
    AttemptFailed { retryable: bool },
    BackoffElapsed,
}

impl RetryState {
    /// First attempt in flight.
    pub fn initial() -> Self {
        RetryState::Attempting { attempt: 1 }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RetryState::Succeeded { .. } | RetryState::Exhausted { .. }
        )
    }

    pub fn attempts(&self) -> u32 {
        match *self {
            RetryState::Attempting { attempt } | RetryState::Backoff { attempt } => attempt,
            RetryState::Succeeded { attempts } | RetryState::Exhausted { attempts } => attempts,
        }
    }
}

/// Pure transition function. Events that do not apply to the current state
/// leave it unchanged; terminal states absorb everything.
pub fn transition(state: RetryState, event: RetryEvent, max_attempts: u32) -> RetryState {
    match (state, event) {
        (RetryState::Attempting { attempt }, RetryEvent::AttemptSucceeded) => {
            RetryState::Succeeded { attempts: attempt }
        }
        (RetryState::Attempting { attempt }, RetryEvent::AttemptFailed { retryable }) => {
            if retryable && attempt < max_attempts {
                RetryState::Backoff { attempt }
            } else {
                RetryState::Exhausted { attempts: attempt }
            }
        }
        (RetryState::Backoff { attempt }, RetryEvent::BackoffElapsed) => {
            RetryState::Attempting {
                attempt: attempt + 1,
            }
        }
        (state, _) => state,
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, timeout_per_attempt: Duration, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            timeout_per_attempt,
            backoff,
        }
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or
    /// `max_attempts` tries have failed.
    ///
    /// Each attempt races `op()` against `timeout_per_attempt`; a timed-out
    /// attempt's future is dropped. No caching happens here.
    pub async fn call_with_retry<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut state = RetryState::initial();
        let mut last: Option<Result<T>> = None;

        while !state.is_terminal() {
            match state {
                RetryState::Attempting { attempt } => {
                    debug!(operation, attempt, max_attempts, "upstream attempt");
                    let result = match tokio::time::timeout(self.timeout_per_attempt, op()).await {
                        Ok(result) => result,
                        Err(_) => Err(Error::Timeout {
                            operation: operation.to_string(),
                            timeout_ms: self.timeout_per_attempt.as_millis() as u64,
                        }),
                    };
                    let event = match &result {
                        Ok(_) => RetryEvent::AttemptSucceeded,
                        Err(e) => {
                            let retryable = e.is_retryable();
                            warn!(operation, attempt, retryable, error = %e, "upstream attempt failed");
                            RetryEvent::AttemptFailed { retryable }
                        }
                    };
                    state = transition(state, event, max_attempts);
                    last = Some(result);
                }
                RetryState::Backoff { .. } => {
                    tokio::time::sleep(self.backoff).await;
                    state = transition(state, RetryEvent::BackoffElapsed, max_attempts);
                }
                RetryState::Succeeded { .. } | RetryState::Exhausted { .. } => {}
            }
        }

        match (state, last) {
            (RetryState::Succeeded { attempts }, Some(Ok(value))) => {
                debug!(operation, attempts, "upstream call succeeded");
                Ok(value)
            }
            (RetryState::Exhausted { attempts }, Some(Err(e))) if e.is_retryable() => {
                Err(Error::RetriesExhausted {
                    operation: operation.to_string(),
                    attempts,
                    last: Box::new(e),
                })
            }
            (_, Some(Err(e))) => Err(e),
            (_, _) => Err(Error::Upstream {
                status: 0,
                message: format!("retry loop for '{}' ended without a result", operation),
                retryable: false,
            }),
        }
    }
}

/// Serializable outcome of a wrapped call: `{"result": ...}` or
/// `{"errorKind": ..., "message": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CallOutcome<T> {
    Success {
        result: T,
    },
    Failure {
        #[serde(rename = "errorKind")]
        error_kind: ErrorKind,
        message: String,
    },
}

impl<T> CallOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, CallOutcome::Success { .. })
    }
}

impl<T> From<Result<T>> for CallOutcome<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(result) => CallOutcome::Success { result },
            Err(e) => CallOutcome::Failure {
                error_kind: e.kind(),
                message: e.user_message(),
            },
        }
    }
}
