//! Batch scheduling, caching, and retry pipeline for frame analysis.
//!
//! This crate provides:
//! - A bounded FIFO-eviction cache of per-frame analysis reports
//! - A batch planner that partitions frames under payload and count limits
//! - A single-worker batch scheduler with inter-batch throttling
//! - End-to-end pipeline orchestration and the `framescan` binary

pub mod cache;
pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod planner;
pub mod scheduler;

pub use cache::AnalysisCache;
pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use pipeline::{FramePipeline, RunReport};
pub use planner::BatchPlanner;
pub use scheduler::{BatchOutcome, BatchScheduler, SchedulerConfig};
