//! Dedicated runtime for upstream fetches.
//!
//! Fetches never run on the inbound runtime: completion is always delivered
//! from one of this pool's threads, and a slow upstream cannot starve the
//! threads accepting and relaying client connections.

use std::future::Future;

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;

/// Thread name prefix for pool workers.
pub const FETCH_THREAD_NAME: &str = "get-proxy-fetch";

/// Fixed-size worker pool for upstream fetches.
pub struct FetchPool {
    runtime: Option<Runtime>,
    handle: Handle,
}

impl FetchPool {
    pub fn new(threads: usize) -> std::io::Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(threads)
            .thread_name(FETCH_THREAD_NAME)
            .enable_all()
            .build()?;

        tracing::info!(threads, "Fetch pool started");
        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: Some(runtime),
        })
    }

    /// Run `fut` on the pool. Returns immediately.
    pub fn spawn<F>(&self, fut: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.handle.spawn(fut)
    }
}

impl Drop for FetchPool {
    fn drop(&mut self) {
        // A blocking shutdown would panic when the pool is dropped from async code.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
