//! Extracted video frame.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A single still frame produced by the extractor.
///
/// Frames are immutable once produced: the extractor writes the file and
/// records its size, and everything downstream treats the pair as fixed.
/// Source order is carried by position, not by any field here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Path to the frame image on disk.
    pub path: PathBuf,
    /// File size in bytes, known up front for batch planning.
    pub size_bytes: u64,
}

impl Frame {
    /// Create a new frame record.
    pub fn new(path: impl Into<PathBuf>, size_bytes: u64) -> Self {
        Self {
            path: path.into(),
            size_bytes,
        }
    }

    /// The frame's file name, for logging.
    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("<unnamed>")
    }
}
