use crate::error::{MirrorError, Result};
use crate::status::{RunProgress, RunStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Control surface of a started run.
pub struct RunHandle {
    run_id: String,
    cancel: CancellationToken,
    done: Arc<AtomicBool>,
    progress: watch::Receiver<RunProgress>,
    task: JoinHandle<Result<RunStatus>>,
}

impl RunHandle {
    pub(crate) fn new(
        run_id: String,
        cancel: CancellationToken,
        done: Arc<AtomicBool>,
        progress: watch::Receiver<RunProgress>,
        task: JoinHandle<Result<RunStatus>>,
    ) -> Self {
        Self {
            run_id,
            cancel,
            done,
            progress,
            task,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Request cancellation. Tables already applying statements finish; the rest are skipped.
    /// The resulting status comes from [`RunHandle::join`].
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancel, then wait for the status of what already ran.
    pub async fn cancel_and_join(self) -> Result<RunStatus> {
        self.cancel();
        self.join().await
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }

    /// Latest published progress.
    pub fn progress(&self) -> RunProgress {
        self.progress.borrow().clone()
    }

    /// Receiver notified on every progress change.
    pub fn subscribe(&self) -> watch::Receiver<RunProgress> {
        self.progress.clone()
    }

    /// Wait for the run to finish.
    pub async fn join(self) -> Result<RunStatus> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(MirrorError::RunFailed(e.to_string())),
        }
    }
}
