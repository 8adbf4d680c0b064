//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap upstream fetches with a deadline
//! - Cancel the wrapped future cleanly on expiry
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other errors
//! - Timed-out fetches are relayed as 504 Gateway Timeout

use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// The deadline passed before the wrapped operation finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("deadline of {0:?} exceeded")]
pub struct DeadlineExceeded(pub Duration);

/// Run `fut` to completion or fail once `deadline` has elapsed.
///
/// The future is dropped on expiry, which aborts any I/O it owns.
pub async fn with_deadline<F: Future>(deadline: Duration, fut: F) -> Result<F::Output, DeadlineExceeded> {
    tokio::time::timeout(deadline, fut)
        .await
        .map_err(|_| DeadlineExceeded(deadline))
}
