//! # Resilience Primitives Module
//!
//! Upstream text generation is the least reliable dependency (rate limits,
//! transient 5xx, slow cold starts). [`retry::RetryPolicy`] wraps such a call
//! in a small bounded retry loop with a hard timeout per attempt.
//!
//! ```rust
//! use weather_poetry::resilience::retry::RetryPolicy;
//! use std::time::Duration;
//!
//! # #[tokio::main] async fn main() {
//! let policy = RetryPolicy::new(3, Duration::from_secs(15), Duration::from_millis(5));
//! let text = policy
//!     .call_with_retry("generate", || async { Ok::<_, weather_poetry::Error>("vers".to_string()) })
//!     .await
//!     .unwrap();
//! assert_eq!(text, "vers");
//! # }
//! ```

pub mod retry;

pub use retry::{transition, CallOutcome, RetryEvent, RetryPolicy, RetryState};
