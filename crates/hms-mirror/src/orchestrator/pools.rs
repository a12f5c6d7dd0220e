//! Bounded worker pools.
//!
//! A pool is a named [`Semaphore`]: spawning waits for a permit, and the permit is released
//! when the spawned future finishes.

use crate::error::{MirrorError, Result};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct WorkerPool {
    name: &'static str,
    size: usize,
    semaphore: Arc<Semaphore>,
}

impl WorkerPool {
    pub fn new(name: &'static str, size: usize) -> Self {
        let size = size.max(1);
        Self {
            name,
            size,
            semaphore: Arc::new(Semaphore::new(size)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Permits not currently held by a running task.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Spawn `future` once a permit is free.
    pub async fn spawn<F, T>(&self, future: F) -> Result<JoinHandle<T>>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| MirrorError::Cancelled)?;
        debug!("{} pool: {} permits left", self.name, self.semaphore.available_permits());

        Ok(tokio::spawn(async move {
            let result = future.await;
            drop(permit);
            result
        }))
    }

    /// Spawn `future` only if a permit is free right now.
    pub fn try_spawn<F, T>(&self, future: F) -> Option<JoinHandle<T>>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let permit = self.semaphore.clone().try_acquire_owned().ok()?;
        Some(tokio::spawn(async move {
            let result = future.await;
            drop(permit);
            result
        }))
    }

    /// Refuse further work. Tasks already running are unaffected.
    pub fn close(&self) {
        self.semaphore.close();
    }
}

/// Per-run pools. The run driver itself holds the orchestrator's single coordination permit.
#[derive(Debug, Clone)]
pub struct Pools {
    /// One task per table.
    pub tables: WorkerPool,
    /// Report writing, one file at a time.
    pub reports: WorkerPool,
}

impl Pools {
    pub fn new(concurrency: usize) -> Self {
        Self {
            tables: WorkerPool::new("table", concurrency),
            reports: WorkerPool::new("report", 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_pool_bounds_concurrency() {
        let pool = WorkerPool::new("table", 2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..6 {
            let running = running.clone();
            let peak = peak.clone();
            handles.push(
                pool.spawn(async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                })
                .await
                .unwrap(),
            );
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(pool.available(), 2);
    }

    #[tokio::test]
    async fn test_closed_pool_refuses_work() {
        let pool = WorkerPool::new("report", 1);
        pool.close();
        assert!(matches!(pool.spawn(async {}).await, Err(MirrorError::Cancelled)));
    }

    #[tokio::test]
    async fn test_close_releases_waiting_spawn() {
        let pool = WorkerPool::new("table", 1);
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let busy = pool
            .spawn(async move {
                let _ = rx.await;
            })
            .await
            .unwrap();

        let waiting = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.spawn(async {}).await.map(|_| ()) })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiting.is_finished());

        pool.close();
        assert!(matches!(waiting.await.unwrap(), Err(MirrorError::Cancelled)));

        tx.send(()).unwrap();
        busy.await.unwrap();
    }

    #[tokio::test]
    async fn test_try_spawn_without_permit() {
        let pool = WorkerPool::new("coordination", 1);
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let first = pool
            .try_spawn(async move {
                let _ = rx.await;
            })
            .unwrap();
        assert!(pool.try_spawn(async {}).is_none());

        tx.send(()).unwrap();
        first.await.unwrap();
        assert!(pool.try_spawn(async {}).is_some());
    }

    #[test]
    fn test_zero_size_pool_gets_one_permit() {
        let pools = Pools::new(0);
        assert_eq!(pools.tables.size(), 1);
        assert_eq!(pools.reports.size(), 1);
    }
}
