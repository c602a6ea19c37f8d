//! Progress stream publisher.

use futures::Stream;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::registry::JobRegistry;
use super::types::JobId;
use crate::metrics::PROGRESS_STREAMS_ACTIVE;

/// Serves per-job progress as a stream of integers by polling the registry.
///
/// A stream ends after yielding a terminal value (100 or -1), deleting the
/// job from the registry first. An unknown or malformed id yields a single
/// `0`. Dropping the stream stops its ticker. [`close_all`](Self::close_all)
/// ends every open stream without touching the registry.
#[derive(Debug, Clone)]
pub struct ProgressPublisher {
    registry: Arc<JobRegistry>,
    poll_interval: Duration,
    active: Arc<AtomicUsize>,
    shutdown: CancellationToken,
}

impl ProgressPublisher {
    pub fn new(registry: Arc<JobRegistry>, poll_interval: Duration) -> Self {
        Self {
            registry,
            poll_interval,
            active: Arc::new(AtomicUsize::new(0)),
            shutdown: CancellationToken::new(),
        }
    }

    /// Ends all open streams and makes new ones close immediately.
    pub fn close_all(&self) {
        self.shutdown.cancel();
    }

    /// Number of streams whose ticker is still alive.
    pub fn active_streams(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Opens a progress stream for the job named by `raw_id`.
    pub fn subscribe(&self, raw_id: &str) -> impl Stream<Item = i32> + Send + 'static {
        let id = raw_id.parse::<JobId>().ok();
        let registry = Arc::clone(&self.registry);
        let mut ticker = PollTicker::new(self.poll_interval, Arc::clone(&self.active));
        let shutdown = self.shutdown.clone();

        debug!(job_id = %raw_id, "Progress stream opened");

        async_stream::stream! {
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = shutdown.cancelled() => break,
                }

                let Some(snapshot) = id.and_then(|id| registry.get(&id)) else {
                    yield 0;
                    break;
                };

                if snapshot.status.is_terminal() {
                    if let Some(id) = id {
                        registry.delete(&id);
                    }
                    yield snapshot.progress;
                    break;
                }

                yield snapshot.progress;
            }
        }
    }
}

/// Poll timer bound to one progress stream.
///
/// Lives inside the stream, so every way the stream ends (terminal state,
/// client disconnect, server shutdown) releases it.
struct PollTicker {
    interval: Interval,
    active: Arc<AtomicUsize>,
}

impl PollTicker {
    fn new(period: Duration, active: Arc<AtomicUsize>) -> Self {
        let mut interval = interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        active.fetch_add(1, Ordering::SeqCst);
        PROGRESS_STREAMS_ACTIVE.inc();
        Self { interval, active }
    }

    async fn tick(&mut self) {
        self.interval.tick().await;
    }
}

impl Drop for PollTicker {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        PROGRESS_STREAMS_ACTIVE.dec();
        debug!("Progress stream closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::OutputFormat;
    use crate::jobs::types::{ConversionJob, PROGRESS_FAILED};
    use futures::StreamExt;
    use std::path::PathBuf;
    use tokio::time::timeout;

    const POLL: Duration = Duration::from_millis(10);

    fn setup() -> (Arc<JobRegistry>, ProgressPublisher, JobId) {
        let registry = Arc::new(JobRegistry::new());
        let id = JobId::new();
        registry
            .create(ConversionJob::new(
                id,
                PathBuf::from("/uploads/in"),
                OutputFormat::Mp4,
                PathBuf::from("/work/out.mp4"),
            ))
            .unwrap();
        let publisher = ProgressPublisher::new(Arc::clone(&registry), POLL);
        (registry, publisher, id)
    }

    #[tokio::test]
    async fn test_unknown_id_emits_single_zero() {
        let publisher = ProgressPublisher::new(Arc::new(JobRegistry::new()), POLL);
        let values: Vec<i32> = timeout(
            Duration::from_secs(1),
            publisher.subscribe(&JobId::new().to_string()).collect(),
        )
        .await
        .expect("stream should close");
        assert_eq!(values, vec![0]);
    }

    #[tokio::test]
    async fn test_malformed_id_emits_single_zero() {
        let publisher = ProgressPublisher::new(Arc::new(JobRegistry::new()), POLL);
        let values: Vec<i32> = publisher.subscribe("../etc/passwd").collect().await;
        assert_eq!(values, vec![0]);
    }

    #[tokio::test]
    async fn test_stream_closes_on_success_and_deletes_job() {
        let (registry, publisher, id) = setup();
        registry.set_progress(&id, 100);

        let values: Vec<i32> = publisher.subscribe(&id.to_string()).collect().await;

        assert_eq!(values, vec![100]);
        assert!(registry.get(&id).is_none());
    }

    #[tokio::test]
    async fn test_stream_closes_on_failure_and_deletes_job() {
        let (registry, publisher, id) = setup();
        registry.set_progress(&id, 30);

        let mut stream = Box::pin(publisher.subscribe(&id.to_string()));
        assert_eq!(stream.next().await, Some(30));

        registry.set_progress(&id, PROGRESS_FAILED);
        let rest: Vec<i32> = timeout(Duration::from_secs(1), stream.collect())
            .await
            .expect("stream should close on failure");

        assert_eq!(rest.last(), Some(&-1));
        assert!(registry.get(&id).is_none());
    }

    #[tokio::test]
    async fn test_stream_follows_progress() {
        let (registry, publisher, id) = setup();
        let mut stream = Box::pin(publisher.subscribe(&id.to_string()));

        assert_eq!(stream.next().await, Some(0));
        registry.set_progress(&id, 1);
        assert_eq!(stream.next().await, Some(1));
        registry.set_progress(&id, 55);
        assert_eq!(stream.next().await, Some(55));
        registry.set_progress(&id, 100);
        assert_eq!(stream.next().await, Some(100));
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test]
    async fn test_dropping_stream_releases_ticker() {
        let (registry, publisher, id) = setup();
        registry.set_progress(&id, 10);

        let mut stream = Box::pin(publisher.subscribe(&id.to_string()));
        assert_eq!(stream.next().await, Some(10));
        assert_eq!(publisher.active_streams(), 1);

        drop(stream);

        assert_eq!(publisher.active_streams(), 0);
        // Disconnecting does not consume the job
        assert!(registry.get(&id).is_some());
    }

    #[tokio::test]
    async fn test_close_all_ends_open_streams() {
        let (registry, publisher, id) = setup();
        registry.set_progress(&id, 20);

        let mut stream = Box::pin(publisher.subscribe(&id.to_string()));
        assert_eq!(stream.next().await, Some(20));

        publisher.close_all();

        let next = timeout(Duration::from_secs(1), stream.next())
            .await
            .expect("stream should close on shutdown");
        assert_eq!(next, None);
        drop(stream);
        assert_eq!(publisher.active_streams(), 0);
        // The job is left for its conversion to settle
        assert_eq!(registry.get(&id).unwrap().progress, 20);
    }

    #[tokio::test]
    async fn test_ticker_released_after_terminal_state() {
        let (registry, publisher, id) = setup();
        registry.set_progress(&id, 100);

        let mut stream = Box::pin(publisher.subscribe(&id.to_string()));
        while stream.next().await.is_some() {}
        drop(stream);

        assert_eq!(publisher.active_streams(), 0);
    }
}
