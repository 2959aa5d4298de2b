//! Shared data models for the framescan pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Frames and sealed frame batches
//! - Content fingerprints (cache keys)
//! - Per-frame analysis reports

pub mod batch;
pub mod fingerprint;
pub mod frame;
pub mod report;

// Re-export common types
pub use batch::{BatchId, FrameBatch};
pub use fingerprint::Fingerprint;
pub use frame::Frame;
pub use report::FrameReport;
