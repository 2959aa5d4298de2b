//! End-to-end pipeline orchestration.

use std::path::Path;
use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use fscan_analysis::{FrameAnalyzer, GeminiClient};
use fscan_media::{extract_frames, normalize_frame};
use fscan_models::{Frame, FrameReport};

use crate::cache::AnalysisCache;
use crate::config::PipelineConfig;
use crate::error::PipelineResult;
use crate::scheduler::{BatchOutcome, BatchScheduler};

/// Summary of one pipeline run.
#[derive(Debug)]
pub struct RunReport {
    /// Frames extracted from the source video.
    pub frames: usize,
    /// Batches planned and enqueued.
    pub batches: usize,
    /// Batches that completed with reports.
    pub completed: usize,
    /// Batches dropped after terminal failures.
    pub failed: usize,
    /// Reports from completed batches, in source order. Frames belonging to
    /// failed batches produce no report.
    pub reports: Vec<FrameReport>,
}

/// End-to-end frame pipeline: extract, normalize, batch, schedule.
///
/// The scheduler (and its single drain worker) is shared across every run
/// made through this pipeline; the analysis cache is per run unless a
/// caller passes the same instance to [`FramePipeline::run_with_cache`].
pub struct FramePipeline<A: FrameAnalyzer> {
    config: PipelineConfig,
    scheduler: BatchScheduler<A>,
}

impl FramePipeline<GeminiClient> {
    /// Build a pipeline with a Gemini client from the environment.
    pub fn from_env(config: PipelineConfig) -> PipelineResult<Self> {
        let client = GeminiClient::from_env()?;
        Ok(Self::new(config, client))
    }
}

impl<A: FrameAnalyzer> FramePipeline<A> {
    /// Create a pipeline around `analyzer`.
    pub fn new(config: PipelineConfig, analyzer: A) -> Self {
        let scheduler = BatchScheduler::new(analyzer, config.scheduler_config());
        Self { config, scheduler }
    }

    /// The shared batch scheduler.
    pub fn scheduler(&self) -> &BatchScheduler<A> {
        &self.scheduler
    }

    /// Process one source video end to end with a fresh cache.
    pub async fn run(&self, video_path: impl AsRef<Path>) -> PipelineResult<RunReport> {
        let cache = Arc::new(AnalysisCache::new(self.config.cache_capacity));
        self.run_with_cache(video_path, cache).await
    }

    /// Process one source video, reusing an existing cache.
    ///
    /// Extraction or normalization failures abort the run; there is nothing
    /// to batch without frames. Batch-level failures never do.
    pub async fn run_with_cache(
        &self,
        video_path: impl AsRef<Path>,
        cache: Arc<AnalysisCache>,
    ) -> PipelineResult<RunReport> {
        let video_path = video_path.as_ref();
        let frames_dir = self
            .config
            .work_dir
            .join(Uuid::new_v4().to_string())
            .join("frames");

        let frame_paths = extract_frames(video_path, &frames_dir, self.config.sample_fps).await?;

        let mut frames = Vec::with_capacity(frame_paths.len());
        for path in frame_paths {
            normalize_frame(
                &path,
                self.config.max_frame_width,
                self.config.max_frame_height,
            )
            .await?;

            let size_bytes = tokio::fs::metadata(&path).await?.len();
            frames.push(Frame::new(path, size_bytes));
        }

        info!(
            video = %video_path.display(),
            frames = frames.len(),
            "Frames ready for batching"
        );

        self.run_frames(frames, cache).await
    }

    /// Plan and dispatch pre-extracted frames, awaiting every batch outcome.
    pub async fn run_frames(
        &self,
        frames: Vec<Frame>,
        cache: Arc<AnalysisCache>,
    ) -> PipelineResult<RunReport> {
        let frame_count = frames.len();
        let planner = self.config.planner();

        let mut receivers = Vec::new();
        for batch in planner.plan(frames) {
            receivers.push(self.scheduler.enqueue(batch, Arc::clone(&cache)).await);
        }
        let batches = receivers.len();

        let mut completed = 0;
        let mut failed = 0;
        let mut reports = Vec::new();
        for rx in receivers {
            match rx.await {
                Ok(BatchOutcome::Completed(mut batch_reports)) => {
                    completed += 1;
                    reports.append(&mut batch_reports);
                }
                Ok(BatchOutcome::Failed(_)) => failed += 1,
                // Worker dropped the channel without sending an outcome.
                Err(_) => failed += 1,
            }
        }

        info!(frames = frame_count, batches, completed, failed, "Run finished");

        Ok(RunReport {
            frames: frame_count,
            batches,
            completed,
            failed,
            reports,
        })
    }
}
