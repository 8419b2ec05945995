// src/exec/pool.rs

//! Bounded worker pool shared by every plan executed in a session.

use std::sync::{Arc, OnceLock};

use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info};

use crate::errors::{PlanError, Result};

/// Semaphore-backed pool of `size` worker slots.
///
/// A unit of work holds a slot only while its task body runs; waiting for
/// dependencies happens before a slot is acquired. Nested plans started from
/// inside a running task get their own pool one level deeper (see
/// [`WorkerPool::nested`]) so they never wait on the slot their parent holds.
///
/// Cloning is cheap and yields a handle to the same pool.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

#[derive(Debug)]
struct PoolInner {
    size: usize,
    depth: usize,
    permits: Arc<Semaphore>,
    shutdown: Arc<watch::Sender<bool>>,
    nested: OnceLock<WorkerPool>,
}

impl WorkerPool {
    /// Create a top-level pool. `size` is clamped to at least 1.
    pub fn new(size: usize) -> Self {
        let (tx, _rx) = watch::channel(false);
        Self::with_signal(size, 0, Arc::new(tx))
    }

    fn with_signal(size: usize, depth: usize, shutdown: Arc<watch::Sender<bool>>) -> Self {
        let size = size.max(1);
        Self {
            inner: Arc::new(PoolInner {
                size,
                depth,
                permits: Arc::new(Semaphore::new(size)),
                shutdown,
                nested: OnceLock::new(),
            }),
        }
    }

    pub fn size(&self) -> usize {
        self.inner.size
    }

    /// Nesting level: 0 for the session pool.
    pub fn depth(&self) -> usize {
        self.inner.depth
    }

    /// Currently free slots.
    pub fn available(&self) -> usize {
        self.inner.permits.available_permits()
    }

    /// Pool used for plans started from tasks running on this pool.
    ///
    /// Created on first use and shared by all tasks at this depth.
    pub fn nested(&self) -> WorkerPool {
        self.inner
            .nested
            .get_or_init(|| {
                debug!(depth = self.inner.depth + 1, size = self.inner.size, "creating nested worker pool");
                let child = WorkerPool::with_signal(
                    self.inner.size,
                    self.inner.depth + 1,
                    Arc::clone(&self.inner.shutdown),
                );
                if self.is_shut_down() {
                    child.inner.permits.close();
                }
                child
            })
            .clone()
    }

    /// Wait for a free slot.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit> {
        Arc::clone(&self.inner.permits)
            .acquire_owned()
            .await
            .map_err(|_| PlanError::PoolClosed)
    }

    /// Signal every unit of the session to stop at its next suspension point,
    /// and close this pool and the pools nested below it.
    pub fn shutdown(&self) {
        info!(depth = self.inner.depth, "shutting down worker pool");
        self.inner.shutdown.send_replace(true);
        self.close_all();
    }

    fn close_all(&self) {
        self.inner.permits.close();
        if let Some(child) = self.inner.nested.get() {
            child.close_all();
        }
    }

    pub fn is_shut_down(&self) -> bool {
        *self.inner.shutdown.borrow()
    }

    /// Resolves once [`shutdown`](Self::shutdown) has been called on any pool
    /// of this session.
    pub fn shutdown_requested(&self) -> impl Future<Output = ()> + Send + use<> {
        let mut rx = self.inner.shutdown.subscribe();
        async move {
            loop {
                if *rx.borrow_and_update() {
                    return;
                }
                if rx.changed().await.is_err() {
                    // Sender gone: the session can no longer be shut down.
                    std::future::pending::<()>().await;
                }
            }
        }
    }
}
