//! Cancellation of in-flight requests.
//!
//! Each dispatched request registers one [`CancelHandle`]. Handles are only ever dropped from the
//! [`CancelRegistry`] wholesale, by [`CancelRegistry::cancel_all`]; a request that completes
//! normally leaves its handle behind until the next sweep.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::debug;
use tokio_util::sync::CancellationToken;

/// Aborts the one request it is bound to.
///
/// Cancelling is idempotent and harmless after the request has completed.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle(CancellationToken);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.is_cancelled()
    }

    /// Completes once [`Self::cancel`] has been called on this handle or any of its clones.
    pub async fn cancelled(&self) {
        self.0.cancelled().await
    }
}

#[derive(Debug, Default)]
struct Pending {
    handles: Vec<CancelHandle>,
    sweeps: u64,
}

/// Shared, ordered collection of the handles of pending requests.
///
/// Clones share the same underlying collection.
#[derive(Clone, Debug, Default)]
pub struct CancelRegistry(Arc<Mutex<Pending>>);

impl CancelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, handle: CancelHandle) {
        self.lock().handles.push(handle);
    }

    /// Cancel every registered handle and empty the registry.
    ///
    /// Returns the number of handles that were cancelled.
    pub fn cancel_all(&self) -> usize {
        let handles = {
            let mut pending = self.lock();
            pending.sweeps += 1;
            std::mem::take(&mut pending.handles)
        };
        for handle in &handles {
            handle.cancel();
        }
        debug!("Cancelled {} pending request(s)", handles.len());
        handles.len()
    }

    pub fn len(&self) -> usize {
        self.lock().handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// How many times [`Self::cancel_all`] has run.
    pub fn sweeps(&self) -> u64 {
        self.lock().sweeps
    }

    fn lock(&self) -> MutexGuard<'_, Pending> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
