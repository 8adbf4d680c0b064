//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!
//! Shutdown (shutdown.rs):
//!     Trigger → Stop accepting → Finish in-flight responses → Exit
//! ```
//!
//! # Design Decisions
//! - The cache lives only in memory, so nothing is flushed on exit
//! - A second signal is not special-cased; the process already exits once
//!   in-flight responses finish

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
