//! Batch scheduler with a single drain worker.
//!
//! Producers enqueue sealed batches; at most one worker task drains the
//! queue in FIFO order, consulting the per-run cache, calling the remote
//! analyzer through the retry controller, and pausing a fixed throttle
//! delay between dispatches. A failing batch is logged and dropped; the
//! worker always moves on to the next item.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, error, info};

use fscan_analysis::{
    retry_rate_limited, AnalysisError, BackoffPolicy, FrameAnalyzer, FramePayload,
};
use fscan_models::{Fingerprint, FrameBatch, FrameReport};

use crate::cache::AnalysisCache;
use crate::metrics::{record_batch, record_queue_depth};

/// Completion signal for an enqueued batch.
#[derive(Debug, Clone)]
pub enum BatchOutcome {
    /// One report per frame, in source order.
    Completed(Vec<FrameReport>),
    /// The batch was dropped after a terminal failure.
    Failed(String),
}

/// A sealed batch waiting in the queue.
struct QueueItem {
    batch: FrameBatch,
    cache: Arc<AnalysisCache>,
    completion: oneshot::Sender<BatchOutcome>,
    enqueued_at: DateTime<Utc>,
}

/// Scheduler tuning.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Fixed pause between batch dispatches.
    pub throttle_delay: Duration,
    /// Backoff policy for rate-limited remote calls.
    pub backoff: BackoffPolicy,
    /// When a batch is only partially cached, send just the misses and
    /// reuse the cached reports. Off by default: the stock behavior
    /// refetches the whole batch on any miss.
    pub partial_reuse: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            throttle_delay: Duration::from_millis(10_000),
            backoff: BackoffPolicy::default(),
            partial_reuse: false,
        }
    }
}

struct Shared<A> {
    analyzer: A,
    config: SchedulerConfig,
    queue: Mutex<VecDeque<QueueItem>>,
    draining: AtomicBool,
}

/// Process-wide batch scheduler.
///
/// Clones share the same queue and worker; construct one per process (or
/// one per independent pipeline) and hand clones to producers.
pub struct BatchScheduler<A: FrameAnalyzer> {
    shared: Arc<Shared<A>>,
}

impl<A: FrameAnalyzer> Clone for BatchScheduler<A> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<A: FrameAnalyzer> BatchScheduler<A> {
    /// Create a scheduler draining into `analyzer`.
    pub fn new(analyzer: A, config: SchedulerConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                analyzer,
                config,
                queue: Mutex::new(VecDeque::new()),
                draining: AtomicBool::new(false),
            }),
        }
    }

    /// Append a sealed batch to the queue. Always succeeds.
    ///
    /// The returned receiver resolves once the batch has been dispatched
    /// (or dropped after a terminal failure); callers may also drop it and
    /// let the worker run fire-and-forget.
    pub async fn enqueue(
        &self,
        batch: FrameBatch,
        cache: Arc<AnalysisCache>,
    ) -> oneshot::Receiver<BatchOutcome> {
        let (tx, rx) = oneshot::channel();

        let depth = {
            let mut queue = self.shared.queue.lock().await;
            queue.push_back(QueueItem {
                batch,
                cache,
                completion: tx,
                enqueued_at: Utc::now(),
            });
            queue.len()
        };
        record_queue_depth(depth);

        self.spawn_worker_if_idle();
        rx
    }

    /// Number of batches currently waiting.
    pub async fn queue_len(&self) -> usize {
        self.shared.queue.lock().await.len()
    }

    /// Claim the draining flag and spawn the worker task; a no-op when a
    /// worker is already active.
    fn spawn_worker_if_idle(&self) {
        if self
            .shared
            .draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let shared = Arc::clone(&self.shared);
            tokio::spawn(drain(shared));
        }
    }
}

/// Drain the queue until it is empty, then go idle.
async fn drain<A: FrameAnalyzer>(shared: Arc<Shared<A>>) {
    debug!("Batch worker started");

    loop {
        let item = {
            let mut queue = shared.queue.lock().await;
            let item = queue.pop_front();
            record_queue_depth(queue.len());
            item
        };

        let Some(item) = item else {
            shared.draining.store(false, Ordering::Release);

            // A producer may have pushed between the empty pop and the flag
            // clear; reclaim the flag in that case instead of going idle.
            let refilled = !shared.queue.lock().await.is_empty();
            if refilled
                && shared
                    .draining
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
            {
                continue;
            }
            break;
        };

        let QueueItem {
            batch,
            cache,
            completion,
            enqueued_at,
        } = item;

        let waited_ms = (Utc::now() - enqueued_at).num_milliseconds();
        debug!(batch_id = %batch.id(), frames = batch.len(), waited_ms, "Dispatching batch");

        let outcome = process_batch(&shared, &batch, &cache).await;
        match &outcome {
            BatchOutcome::Completed(reports) => {
                record_batch("completed");
                debug!(batch_id = %batch.id(), reports = reports.len(), "Batch completed");
            }
            BatchOutcome::Failed(reason) => {
                record_batch("failed");
                error!(
                    batch_id = %batch.id(),
                    frames = batch.len(),
                    reason = %reason,
                    "Batch failed, continuing with next"
                );
            }
        }

        // The producer may have dropped its receiver; completion is best effort.
        let _ = completion.send(outcome);

        tokio::time::sleep(shared.config.throttle_delay).await;
    }

    debug!("Batch worker idle");
}

/// Process one batch: cache consultation, remote call, write-back.
async fn process_batch<A: FrameAnalyzer>(
    shared: &Shared<A>,
    batch: &FrameBatch,
    cache: &AnalysisCache,
) -> BatchOutcome {
    // By dispatch time extraction has succeeded, so an unreadable frame file
    // is a batch-level failure rather than a run abort.
    let mut payloads = Vec::with_capacity(batch.len());
    let mut fingerprints = Vec::with_capacity(batch.len());
    for frame in batch.frames() {
        match tokio::fs::read(&frame.path).await {
            Ok(bytes) => {
                fingerprints.push(Fingerprint::of_bytes(&bytes));
                payloads.push(FramePayload::new(frame.file_name(), bytes));
            }
            Err(e) => {
                return BatchOutcome::Failed(format!(
                    "Failed to read frame {}: {}",
                    frame.path.display(),
                    e
                ));
            }
        }
    }

    let mut cached = Vec::with_capacity(batch.len());
    for fingerprint in &fingerprints {
        cached.push(cache.lookup(fingerprint).await);
    }

    if cached.iter().all(|c| c.is_some()) {
        info!(batch_id = %batch.id(), frames = batch.len(), "All frames cached, skipping remote call");
        return BatchOutcome::Completed(cached.into_iter().flatten().collect());
    }

    if shared.config.partial_reuse {
        return process_partial(shared, cache, &fingerprints, &payloads, cached).await;
    }

    // Stock behavior: any miss refetches the whole batch, and the cached
    // entries inside it are not reused.
    match analyze_with_backoff(shared, &payloads).await {
        Ok(reports) => {
            for (fingerprint, report) in fingerprints.iter().zip(&reports) {
                cache.insert(fingerprint.clone(), report.clone()).await;
            }
            BatchOutcome::Completed(reports)
        }
        Err(e) => BatchOutcome::Failed(e.to_string()),
    }
}

/// Opt-in enhancement: submit only the cache misses and merge the fresh
/// reports with the cached ones positionally.
async fn process_partial<A: FrameAnalyzer>(
    shared: &Shared<A>,
    cache: &AnalysisCache,
    fingerprints: &[Fingerprint],
    payloads: &[FramePayload],
    cached: Vec<Option<FrameReport>>,
) -> BatchOutcome {
    let miss_payloads: Vec<FramePayload> = cached
        .iter()
        .zip(payloads)
        .filter(|(slot, _)| slot.is_none())
        .map(|(_, payload)| payload.clone())
        .collect();

    let fresh = match analyze_with_backoff(shared, &miss_payloads).await {
        Ok(reports) => reports,
        Err(e) => return BatchOutcome::Failed(e.to_string()),
    };

    if fresh.len() != miss_payloads.len() {
        return BatchOutcome::Failed(format!(
            "Expected {} reports for cache misses, got {}",
            miss_payloads.len(),
            fresh.len()
        ));
    }

    let mut fresh = fresh.into_iter();
    let mut merged = Vec::with_capacity(cached.len());
    for (slot, fingerprint) in cached.into_iter().zip(fingerprints) {
        match slot {
            Some(report) => merged.push(report),
            None => {
                // Count was validated above, so the iterator cannot run dry.
                let Some(report) = fresh.next() else { break };
                cache.insert(fingerprint.clone(), report.clone()).await;
                merged.push(report);
            }
        }
    }

    BatchOutcome::Completed(merged)
}

async fn analyze_with_backoff<A: FrameAnalyzer>(
    shared: &Shared<A>,
    payloads: &[FramePayload],
) -> Result<Vec<FrameReport>, AnalysisError> {
    retry_rate_limited(&shared.config.backoff, "analyze_frames", || {
        shared.analyzer.analyze_frames(payloads)
    })
    .await
    .map_err(AnalysisError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::AtomicU32;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    use tempfile::TempDir;
    use tokio::time::timeout;

    use fscan_analysis::AnalysisResult;
    use fscan_models::Frame;

    #[derive(Clone, Copy)]
    enum Step {
        Succeed,
        RateLimit,
        Fail,
    }

    /// Scripted stand-in for the remote service.
    struct ScriptedAnalyzer {
        script: StdMutex<VecDeque<Step>>,
        calls: AtomicU32,
        in_flight: AtomicU32,
        max_in_flight: AtomicU32,
        seen: StdMutex<Vec<Vec<String>>>,
    }

    impl ScriptedAnalyzer {
        fn new(script: Vec<Step>) -> Arc<Self> {
            Arc::new(Self {
                script: StdMutex::new(script.into()),
                calls: AtomicU32::new(0),
                in_flight: AtomicU32::new(0),
                max_in_flight: AtomicU32::new(0),
                seen: StdMutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }

        fn seen(&self) -> Vec<Vec<String>> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl FrameAnalyzer for ScriptedAnalyzer {
        async fn analyze_frames(&self, frames: &[FramePayload]) -> AnalysisResult<Vec<FrameReport>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);

            // Yield so overlapping dispatches would be observable.
            tokio::time::sleep(Duration::from_millis(2)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            self.seen
                .lock()
                .unwrap()
                .push(frames.iter().map(|f| f.file_name.clone()).collect());

            let step = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Step::Succeed);

            match step {
                Step::Succeed => Ok(frames
                    .iter()
                    .map(|f| FrameReport::new(format!("fresh {}", f.file_name)))
                    .collect()),
                Step::RateLimit => Err(AnalysisError::rate_limited("scripted 429")),
                Step::Fail => Err(AnalysisError::service(500, "scripted failure")),
            }
        }
    }

    fn fast_config() -> SchedulerConfig {
        SchedulerConfig {
            throttle_delay: Duration::from_millis(5),
            backoff: BackoffPolicy::default().with_initial_delay(Duration::from_millis(1)),
            partial_reuse: false,
        }
    }

    /// Write `contents` as frame files and return the matching Frame records.
    fn write_frames(dir: &TempDir, prefix: &str, contents: &[&[u8]]) -> (Vec<Frame>, Vec<Fingerprint>) {
        let mut frames = Vec::new();
        let mut fingerprints = Vec::new();
        for (i, content) in contents.iter().enumerate() {
            let path: PathBuf = dir.path().join(format!("{}-{:04}.png", prefix, i + 1));
            std::fs::write(&path, content).unwrap();
            frames.push(Frame::new(path, content.len() as u64));
            fingerprints.push(Fingerprint::of_bytes(content));
        }
        (frames, fingerprints)
    }

    async fn await_outcome(rx: oneshot::Receiver<BatchOutcome>) -> BatchOutcome {
        timeout(Duration::from_secs(5), rx)
            .await
            .expect("batch not processed in time")
            .expect("worker dropped completion")
    }

    #[tokio::test]
    async fn test_fully_cached_batch_skips_remote_call() {
        let dir = TempDir::new().unwrap();
        let (frames, fingerprints) = write_frames(&dir, "frame", &[b"one", b"two", b"three"]);

        let cache = Arc::new(AnalysisCache::new(100));
        for (i, fingerprint) in fingerprints.iter().enumerate() {
            cache
                .insert(fingerprint.clone(), FrameReport::new(format!("cached {}", i)))
                .await;
        }

        let analyzer = ScriptedAnalyzer::new(vec![]);
        let scheduler = BatchScheduler::new(analyzer.clone(), fast_config());

        let rx = scheduler
            .enqueue(FrameBatch::seal(frames), Arc::clone(&cache))
            .await;

        match await_outcome(rx).await {
            BatchOutcome::Completed(reports) => {
                assert_eq!(reports.len(), 3);
                assert_eq!(reports[0].description, "cached 0");
                assert_eq!(reports[2].description, "cached 2");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(analyzer.calls(), 0, "no remote call for a full cache hit");
    }

    #[tokio::test]
    async fn test_partial_hit_refetches_whole_batch() {
        let dir = TempDir::new().unwrap();
        let (frames, fingerprints) = write_frames(&dir, "frame", &[b"one", b"two", b"three"]);

        let cache = Arc::new(AnalysisCache::new(100));
        cache
            .insert(fingerprints[0].clone(), FrameReport::new("cached 0"))
            .await;

        let analyzer = ScriptedAnalyzer::new(vec![Step::Succeed]);
        let scheduler = BatchScheduler::new(analyzer.clone(), fast_config());

        let rx = scheduler
            .enqueue(FrameBatch::seal(frames), Arc::clone(&cache))
            .await;

        match await_outcome(rx).await {
            BatchOutcome::Completed(reports) => {
                assert_eq!(reports.len(), 3);
                // The cached report is NOT reused; all three come back fresh.
                assert_eq!(reports[0].description, "fresh frame-0001.png");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        // The whole batch went over the wire.
        assert_eq!(analyzer.seen()[0].len(), 3);
        // And the fresh report overwrote the cached one.
        assert_eq!(
            cache.lookup(&fingerprints[0]).await.unwrap().description,
            "fresh frame-0001.png"
        );
    }

    #[tokio::test]
    async fn test_partial_reuse_sends_only_misses() {
        let dir = TempDir::new().unwrap();
        let (frames, fingerprints) = write_frames(&dir, "frame", &[b"one", b"two", b"three"]);

        let cache = Arc::new(AnalysisCache::new(100));
        cache
            .insert(fingerprints[1].clone(), FrameReport::new("cached 1"))
            .await;

        let analyzer = ScriptedAnalyzer::new(vec![Step::Succeed]);
        let mut config = fast_config();
        config.partial_reuse = true;
        let scheduler = BatchScheduler::new(analyzer.clone(), config);

        let rx = scheduler
            .enqueue(FrameBatch::seal(frames), Arc::clone(&cache))
            .await;

        match await_outcome(rx).await {
            BatchOutcome::Completed(reports) => {
                assert_eq!(reports.len(), 3);
                assert_eq!(reports[0].description, "fresh frame-0001.png");
                assert_eq!(reports[1].description, "cached 1");
                assert_eq!(reports[2].description, "fresh frame-0003.png");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(
            analyzer.seen()[0],
            vec!["frame-0001.png".to_string(), "frame-0003.png".to_string()]
        );
    }

    #[tokio::test]
    async fn test_failed_batch_does_not_halt_worker() {
        let dir = TempDir::new().unwrap();
        let (frames_a, _) = write_frames(&dir, "a", &[b"aaa"]);
        let (frames_b, _) = write_frames(&dir, "b", &[b"bbb"]);

        let cache = Arc::new(AnalysisCache::new(100));
        let analyzer = ScriptedAnalyzer::new(vec![Step::Fail, Step::Succeed]);
        let scheduler = BatchScheduler::new(analyzer.clone(), fast_config());

        let rx_a = scheduler
            .enqueue(FrameBatch::seal(frames_a), Arc::clone(&cache))
            .await;
        let rx_b = scheduler
            .enqueue(FrameBatch::seal(frames_b), Arc::clone(&cache))
            .await;

        assert!(matches!(await_outcome(rx_a).await, BatchOutcome::Failed(_)));
        assert!(matches!(
            await_outcome(rx_b).await,
            BatchOutcome::Completed(_)
        ));
        assert_eq!(analyzer.calls(), 2);
    }

    #[tokio::test]
    async fn test_rate_limit_exhaustion_fails_batch() {
        let dir = TempDir::new().unwrap();
        let (frames, _) = write_frames(&dir, "frame", &[b"aaa"]);

        let cache = Arc::new(AnalysisCache::new(100));
        let analyzer = ScriptedAnalyzer::new(vec![Step::RateLimit; 5]);
        let mut config = fast_config();
        config.backoff = config.backoff.with_max_retries(3);
        let scheduler = BatchScheduler::new(analyzer.clone(), config);

        let rx = scheduler
            .enqueue(FrameBatch::seal(frames), Arc::clone(&cache))
            .await;

        match await_outcome(rx).await {
            BatchOutcome::Failed(reason) => {
                assert!(reason.contains("Maximum retries"), "reason: {reason}");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(analyzer.calls(), 3, "no attempt beyond the retry bound");
    }

    #[tokio::test]
    async fn test_batches_drain_in_fifo_order_with_one_worker() {
        let dir = TempDir::new().unwrap();
        let cache = Arc::new(AnalysisCache::new(100));
        let analyzer = ScriptedAnalyzer::new(vec![]);
        let scheduler = BatchScheduler::new(analyzer.clone(), fast_config());

        let mut receivers = Vec::new();
        for (prefix, content) in [("a", &b"first"[..]), ("b", b"second"), ("c", b"third")] {
            let (frames, _) = write_frames(&dir, prefix, &[content]);
            receivers.push(
                scheduler
                    .enqueue(FrameBatch::seal(frames), Arc::clone(&cache))
                    .await,
            );
        }

        for rx in receivers {
            assert!(matches!(
                await_outcome(rx).await,
                BatchOutcome::Completed(_)
            ));
        }

        // Strict FIFO: one call per batch, in enqueue order, never overlapping.
        let seen = analyzer.seen();
        assert_eq!(
            seen,
            vec![
                vec!["a-0001.png".to_string()],
                vec!["b-0001.png".to_string()],
                vec!["c-0001.png".to_string()],
            ]
        );
        assert_eq!(analyzer.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_worker_resumes_after_idle() {
        let dir = TempDir::new().unwrap();
        let cache = Arc::new(AnalysisCache::new(100));
        let analyzer = ScriptedAnalyzer::new(vec![]);
        let scheduler = BatchScheduler::new(analyzer.clone(), fast_config());

        let (frames, _) = write_frames(&dir, "a", &[b"one"]);
        let rx = scheduler
            .enqueue(FrameBatch::seal(frames), Arc::clone(&cache))
            .await;
        await_outcome(rx).await;

        // Let the worker drain fully and go idle.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(scheduler.queue_len().await, 0);

        let (frames, _) = write_frames(&dir, "b", &[b"two"]);
        let rx = scheduler
            .enqueue(FrameBatch::seal(frames), Arc::clone(&cache))
            .await;
        assert!(matches!(
            await_outcome(rx).await,
            BatchOutcome::Completed(_)
        ));
        assert_eq!(analyzer.calls(), 2);
    }

    #[tokio::test]
    async fn test_missing_frame_file_fails_batch_only() {
        let dir = TempDir::new().unwrap();
        let (mut frames, _) = write_frames(&dir, "a", &[b"real"]);
        frames.push(Frame::new(dir.path().join("gone.png"), 4));
        let (frames_ok, _) = write_frames(&dir, "b", &[b"fine"]);

        let cache = Arc::new(AnalysisCache::new(100));
        let analyzer = ScriptedAnalyzer::new(vec![]);
        let scheduler = BatchScheduler::new(analyzer.clone(), fast_config());

        let rx_bad = scheduler
            .enqueue(FrameBatch::seal(frames), Arc::clone(&cache))
            .await;
        let rx_ok = scheduler
            .enqueue(FrameBatch::seal(frames_ok), Arc::clone(&cache))
            .await;

        match await_outcome(rx_bad).await {
            BatchOutcome::Failed(reason) => assert!(reason.contains("gone.png")),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(matches!(
            await_outcome(rx_ok).await,
            BatchOutcome::Completed(_)
        ));
    }
}
