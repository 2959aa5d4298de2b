//! Remote frame analysis client and retry controller.
//!
//! This crate provides:
//! - A Gemini `generateContent` client that submits a batch of frames and
//!   returns one report per frame
//! - The error taxonomy for remote analysis, with rate-limit classification
//! - Bounded exponential backoff that retries only rate-limited failures

pub mod client;
pub mod error;
pub mod metrics;
pub mod retry;

pub use client::{FrameAnalyzer, FramePayload, GeminiClient};
pub use error::{AnalysisError, AnalysisResult};
pub use retry::{retry_rate_limited, BackoffPolicy, RetryClass, RetryError};
