//! Long-running operation polling loop.

use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use genmedia_types::{GeneratedAsset, OperationHandle, OperationStatus, ProgressUpdate, ToolError};

use crate::types::{GenerationBackend, ProgressSink};

/// States an operation passes through while being tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Submitted,
    Polling,
    Succeeded,
    Failed,
    TimedOut,
    Canceled,
}

/// Terminal result of [`OperationPoller::wait`].
#[derive(Debug, Clone)]
pub enum PollOutcome {
    Succeeded(Vec<GeneratedAsset>),
    /// Backend's own error text.
    Failed(String),
    TimedOut { elapsed: Duration },
    Canceled,
}

impl PollOutcome {
    pub fn state(&self) -> PollState {
        match self {
            PollOutcome::Succeeded(_) => PollState::Succeeded,
            PollOutcome::Failed(_) => PollState::Failed,
            PollOutcome::TimedOut { .. } => PollState::TimedOut,
            PollOutcome::Canceled => PollState::Canceled,
        }
    }

    pub fn into_result(self, handle: &OperationHandle) -> Result<Vec<GeneratedAsset>, ToolError> {
        match self {
            PollOutcome::Succeeded(assets) => Ok(assets),
            PollOutcome::Failed(message) => Err(ToolError::BackendOperation(message)),
            PollOutcome::TimedOut { elapsed } => Err(ToolError::Timeout {
                operation: handle.name.clone(),
                elapsed_secs: elapsed.as_secs(),
            }),
            PollOutcome::Canceled => Err(ToolError::Canceled {
                operation: handle.name.clone(),
            }),
        }
    }
}

/// Fixed-interval poller with a wall-clock ceiling.
#[derive(Debug, Clone, Copy)]
pub struct OperationPoller {
    interval: Duration,
    ceiling: Duration,
}

impl OperationPoller {
    pub fn new(interval: Duration, ceiling: Duration) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(10)),
            ceiling,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn ceiling(&self) -> Duration {
        self.ceiling
    }

    /// Poll `handle` until it finishes, the ceiling passes, or `cancel` fires.
    ///
    /// The remote job is never canceled; only local tracking stops.
    pub async fn wait(
        &self,
        backend: &dyn GenerationBackend,
        handle: &OperationHandle,
        cancel: &CancellationToken,
        progress: Option<&ProgressSink>,
    ) -> PollOutcome {
        let start = Instant::now();
        let deadline = start + self.ceiling;
        let mut ticker = tokio::time::interval_at(start + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut state = PollState::Submitted;
        let mut ticks: u64 = 0;
        info!(operation = %handle.name, "Tracking operation");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    warn!(operation = %handle.name, from = ?state, "Operation tracking canceled");
                    return PollOutcome::Canceled;
                }
                _ = tokio::time::sleep_until(deadline) => {
                    let elapsed = start.elapsed();
                    warn!(operation = %handle.name, elapsed_secs = elapsed.as_secs(), "Operation timed out");
                    return PollOutcome::TimedOut { elapsed };
                }
                _ = ticker.tick() => {}
            }

            ticks += 1;
            if state == PollState::Submitted {
                debug!(operation = %handle.name, "Submitted -> Polling");
                state = PollState::Polling;
            }

            let status = tokio::select! {
                _ = cancel.cancelled() => {
                    warn!(operation = %handle.name, "Operation tracking canceled");
                    return PollOutcome::Canceled;
                }
                _ = tokio::time::sleep_until(deadline) => {
                    let elapsed = start.elapsed();
                    warn!(operation = %handle.name, elapsed_secs = elapsed.as_secs(), "Operation timed out");
                    return PollOutcome::TimedOut { elapsed };
                }
                status = backend.poll(handle) => status,
            };

            match status {
                Ok(OperationStatus::Pending) => {
                    let elapsed = start.elapsed().as_secs();
                    debug!(operation = %handle.name, elapsed_secs = elapsed, "Operation pending");
                    if let Some(sink) = progress {
                        let _ = sink.send(ProgressUpdate {
                            progress: ticks,
                            message: format!("Generation in progress ({elapsed}s elapsed)"),
                        });
                    }
                }
                Ok(OperationStatus::DoneOk(assets)) => {
                    info!(
                        operation = %handle.name,
                        assets = assets.len(),
                        elapsed_secs = start.elapsed().as_secs(),
                        "Operation succeeded"
                    );
                    return PollOutcome::Succeeded(assets);
                }
                Ok(OperationStatus::DoneError(message)) => {
                    warn!(operation = %handle.name, error = %message, "Operation failed");
                    return PollOutcome::Failed(message);
                }
                Err(e) => {
                    warn!(operation = %handle.name, error = %e, "Failed to get operation status");
                    return PollOutcome::Failed(format!("failed to get operation status: {e}"));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use genmedia_types::MediaDomain;
    use tokio::sync::mpsc;

    use crate::error::BackendError;
    use crate::types::{GenerationRequest, Submission};

    /// Reports pending `pending_polls` times, then `finish`.
    struct ScriptedBackend {
        polls: AtomicUsize,
        pending_polls: usize,
        finish: Option<Result<Vec<GeneratedAsset>, String>>,
    }

    impl ScriptedBackend {
        fn new(pending_polls: usize, finish: Option<Result<Vec<GeneratedAsset>, String>>) -> Self {
            Self {
                polls: AtomicUsize::new(0),
                pending_polls,
                finish,
            }
        }
    }

    #[async_trait]
    impl GenerationBackend for ScriptedBackend {
        fn id(&self) -> &str {
            "scripted"
        }

        fn domain(&self) -> MediaDomain {
            MediaDomain::Video
        }

        async fn submit(&self, _request: &GenerationRequest) -> Result<Submission, BackendError> {
            Ok(Submission::Pending(OperationHandle::new("ops/1", "veo")))
        }

        async fn poll(&self, _handle: &OperationHandle) -> Result<OperationStatus, BackendError> {
            let n = self.polls.fetch_add(1, Ordering::SeqCst);
            if n < self.pending_polls {
                return Ok(OperationStatus::Pending);
            }
            match &self.finish {
                None => Ok(OperationStatus::Pending),
                Some(Ok(assets)) => Ok(OperationStatus::DoneOk(assets.clone())),
                Some(Err(msg)) => Ok(OperationStatus::DoneError(msg.clone())),
            }
        }
    }

    fn poller() -> OperationPoller {
        OperationPoller::new(Duration::from_secs(2), Duration::from_secs(300))
    }

    fn handle() -> OperationHandle {
        OperationHandle::new("ops/1", "veo-3.0-generate-001")
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_pending() {
        let asset = GeneratedAsset::from_locator("gs://b/o.mp4", "video/mp4");
        let backend = ScriptedBackend::new(2, Some(Ok(vec![asset])));
        let start = Instant::now();
        let outcome = poller()
            .wait(&backend, &handle(), &CancellationToken::new(), None)
            .await;
        assert_eq!(outcome.state(), PollState::Succeeded);
        assert_eq!(backend.polls.load(Ordering::SeqCst), 3);
        assert!(start.elapsed() >= Duration::from_secs(6));
        assert!(start.elapsed() < Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_forwards_backend_text() {
        let msg = "Unable to generate video: prompt violates usage guidelines";
        let backend = ScriptedBackend::new(0, Some(Err(msg.into())));
        let outcome = poller()
            .wait(&backend, &handle(), &CancellationToken::new(), None)
            .await;
        let err = outcome.into_result(&handle()).unwrap_err();
        assert_eq!(err, ToolError::BackendOperation(msg.into()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_within_one_interval_of_ceiling() {
        let backend = ScriptedBackend::new(0, None);
        let poller = OperationPoller::new(Duration::from_secs(2), Duration::from_secs(11));
        let start = Instant::now();
        let outcome = poller
            .wait(&backend, &handle(), &CancellationToken::new(), None)
            .await;
        let elapsed = start.elapsed();
        assert_eq!(outcome.state(), PollState::TimedOut);
        assert!(elapsed >= Duration::from_secs(11));
        assert!(elapsed <= Duration::from_secs(13));
        assert!(matches!(
            outcome.into_result(&handle()),
            Err(ToolError::Timeout { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_within_one_interval() {
        let backend = ScriptedBackend::new(0, None);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        let outcome = poller().wait(&backend, &handle(), &cancel, None).await;
        assert_eq!(outcome.state(), PollState::Canceled);
        assert!(start.elapsed() <= Duration::from_secs(7));

        // No polls after cancellation.
        let polls = backend.polls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(backend.polls.load(Ordering::SeqCst), polls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_reported_per_pending_tick() {
        let asset = GeneratedAsset::from_locator("gs://b/o.mp4", "video/mp4");
        let backend = ScriptedBackend::new(3, Some(Ok(vec![asset])));
        let (tx, mut rx) = mpsc::unbounded_channel();
        poller()
            .wait(&backend, &handle(), &CancellationToken::new(), Some(&tx))
            .await;
        drop(tx);

        let mut seen = Vec::new();
        while let Some(update) = rx.recv().await {
            seen.push(update.progress);
        }
        assert_eq!(seen, vec![1, 2, 3]);
    }
}
