//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Upstream fetch:
//!     → timeouts.rs (bounded deadline per fetch)
//!     → on expiry: 504 relayed, nothing cached
//! ```
//!
//! # Design Decisions
//! - Every upstream call has a deadline
//! - No retries: a failed fetch is relayed once and the next client
//!   request starts a fresh attempt

pub mod timeouts;
