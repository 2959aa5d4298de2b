#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper for frame sampling.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - Frame extraction from a source video at a target sampling rate
//! - Image probing via FFprobe
//! - Idempotent in-place frame normalization to a maximum resolution

pub mod command;
pub mod error;
pub mod extract;
pub mod normalize;
pub mod probe;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use extract::extract_frames;
pub use normalize::normalize_frame;
pub use probe::{probe_image, ImageInfo};
