//! Batch planning under payload and count limits.

use fscan_models::{Frame, FrameBatch};

/// Partitions an ordered frame sequence into sealed batches.
///
/// Batches are built greedily in source order. Before a frame joins the
/// working batch, the planner checks whether adding it would push the total
/// payload over `max_payload_bytes`, or whether the working batch already
/// holds `max_batch_frames`; either seals the working batch and starts a new
/// one with that frame. A single frame larger than the payload limit is
/// therefore emitted alone rather than dropped or split, since frames are
/// atomic units.
#[derive(Debug, Clone)]
pub struct BatchPlanner {
    max_payload_bytes: u64,
    max_batch_frames: usize,
}

impl BatchPlanner {
    /// Create a planner with the given limits.
    pub fn new(max_payload_bytes: u64, max_batch_frames: usize) -> Self {
        Self {
            max_payload_bytes,
            max_batch_frames,
        }
    }

    /// Lazily partition `frames` into batches, preserving global order.
    pub fn plan<I>(&self, frames: I) -> BatchStream<I::IntoIter>
    where
        I: IntoIterator<Item = Frame>,
    {
        BatchStream {
            max_payload_bytes: self.max_payload_bytes,
            max_batch_frames: self.max_batch_frames,
            frames: frames.into_iter(),
            pending: Vec::new(),
            pending_size: 0,
        }
    }
}

/// Lazy iterator of sealed batches produced by [`BatchPlanner::plan`].
pub struct BatchStream<I: Iterator<Item = Frame>> {
    max_payload_bytes: u64,
    max_batch_frames: usize,
    frames: I,
    pending: Vec<Frame>,
    pending_size: u64,
}

impl<I: Iterator<Item = Frame>> Iterator for BatchStream<I> {
    type Item = FrameBatch;

    fn next(&mut self) -> Option<FrameBatch> {
        for frame in self.frames.by_ref() {
            let would_overflow = self.pending_size + frame.size_bytes > self.max_payload_bytes;
            let at_count_limit = self.pending.len() >= self.max_batch_frames;

            if (would_overflow || at_count_limit) && !self.pending.is_empty() {
                let sealed = FrameBatch::seal(std::mem::take(&mut self.pending));
                self.pending_size = frame.size_bytes;
                self.pending.push(frame);
                return Some(sealed);
            }

            self.pending_size += frame.size_bytes;
            self.pending.push(frame);
        }

        if self.pending.is_empty() {
            None
        } else {
            self.pending_size = 0;
            Some(FrameBatch::seal(std::mem::take(&mut self.pending)))
        }
    }
}
