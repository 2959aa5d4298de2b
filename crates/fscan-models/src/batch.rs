//! Sealed frame batches.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::frame::Frame;

/// Unique identifier for a dispatched batch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(pub String);

impl BatchId {
    /// Generate a new random batch ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An ordered group of frames dispatched together in one remote call.
///
/// A batch is sealed at construction: the frame list and the recorded total
/// size never change afterwards. `total_size_bytes` always equals the sum of
/// the member frames' sizes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameBatch {
    id: BatchId,
    frames: Vec<Frame>,
    total_size_bytes: u64,
}

impl FrameBatch {
    /// Seal a batch from an ordered list of frames.
    pub fn seal(frames: Vec<Frame>) -> Self {
        let total_size_bytes = frames.iter().map(|f| f.size_bytes).sum();
        Self {
            id: BatchId::new(),
            frames,
            total_size_bytes,
        }
    }

    /// The batch's unique ID.
    pub fn id(&self) -> &BatchId {
        &self.id
    }

    /// The member frames, in source order.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Sum of the member frames' sizes in bytes.
    pub fn total_size_bytes(&self) -> u64 {
        self.total_size_bytes
    }

    /// Number of frames in the batch.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the batch holds no frames.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
