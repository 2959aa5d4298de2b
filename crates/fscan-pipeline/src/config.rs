//! Pipeline configuration.

use std::path::PathBuf;
use std::time::Duration;

use fscan_analysis::BackoffPolicy;

use crate::planner::BatchPlanner;
use crate::scheduler::SchedulerConfig;

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum frame width after normalization
    pub max_frame_width: u32,
    /// Maximum frame height after normalization
    pub max_frame_height: u32,
    /// Maximum total payload bytes per batch
    pub max_payload_bytes: u64,
    /// Maximum frames per batch
    pub max_batch_frames: usize,
    /// Analysis cache capacity in entries
    pub cache_capacity: usize,
    /// Maximum attempts for a rate-limited remote call
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_backoff: Duration,
    /// Backoff multiplier per retry
    pub backoff_multiplier: u32,
    /// Fixed pause between batch dispatches
    pub throttle_delay: Duration,
    /// Frame sampling rate (frames per second)
    pub sample_fps: f64,
    /// Work directory for extracted frames
    pub work_dir: PathBuf,
    /// Reuse cached reports within partially cached batches
    pub partial_reuse: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_frame_width: 512,
            max_frame_height: 512,
            max_payload_bytes: 5_242_880, // 5 MB
            max_batch_frames: 10,
            cache_capacity: 1000,
            max_retries: 5,
            initial_backoff: Duration::from_millis(2000),
            backoff_multiplier: 2,
            throttle_delay: Duration::from_millis(10_000),
            sample_fps: 1.0,
            work_dir: PathBuf::from("/tmp/framescan"),
            partial_reuse: false,
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_frame_width: std::env::var("FRAMESCAN_MAX_FRAME_WIDTH")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_frame_width),
            max_frame_height: std::env::var("FRAMESCAN_MAX_FRAME_HEIGHT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_frame_height),
            max_payload_bytes: std::env::var("FRAMESCAN_MAX_PAYLOAD_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_payload_bytes),
            max_batch_frames: std::env::var("FRAMESCAN_MAX_BATCH_FRAMES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_batch_frames),
            cache_capacity: std::env::var("FRAMESCAN_CACHE_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.cache_capacity),
            max_retries: std::env::var("FRAMESCAN_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
            initial_backoff: Duration::from_millis(
                std::env::var("FRAMESCAN_INITIAL_BACKOFF_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2000),
            ),
            backoff_multiplier: std::env::var("FRAMESCAN_BACKOFF_MULTIPLIER")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.backoff_multiplier),
            throttle_delay: Duration::from_millis(
                std::env::var("FRAMESCAN_THROTTLE_DELAY_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10_000),
            ),
            sample_fps: std::env::var("FRAMESCAN_SAMPLE_FPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.sample_fps),
            work_dir: std::env::var("FRAMESCAN_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            partial_reuse: std::env::var("FRAMESCAN_PARTIAL_REUSE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.partial_reuse),
        }
    }

    /// The backoff policy for remote calls.
    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy::default()
            .with_max_retries(self.max_retries)
            .with_initial_delay(self.initial_backoff)
            .with_multiplier(self.backoff_multiplier)
    }

    /// The scheduler tuning derived from this config.
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            throttle_delay: self.throttle_delay,
            backoff: self.backoff_policy(),
            partial_reuse: self.partial_reuse,
        }
    }

    /// The batch planner derived from this config.
    pub fn planner(&self) -> BatchPlanner {
        BatchPlanner::new(self.max_payload_bytes, self.max_batch_frames)
    }
}
