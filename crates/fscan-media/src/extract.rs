//! Frame extraction from a source video.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::info;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// File name pattern for extracted frames. The zero-padded sequence number
/// keeps lexicographic order equal to source order.
const FRAME_PATTERN: &str = "frame-%04d.png";

/// Prefix shared by all extracted frame files.
const FRAME_PREFIX: &str = "frame-";

/// Extract still frames from `video_path` at `fps` frames per second.
///
/// Frames are written into `out_dir` (created if missing) as
/// `frame-0001.png`, `frame-0002.png`, ... and returned sorted in source
/// order.
pub async fn extract_frames(
    video_path: impl AsRef<Path>,
    out_dir: impl AsRef<Path>,
    fps: f64,
) -> MediaResult<Vec<PathBuf>> {
    let video_path = video_path.as_ref();
    let out_dir = out_dir.as_ref();

    if !video_path.exists() {
        return Err(MediaError::FileNotFound(video_path.to_path_buf()));
    }

    fs::create_dir_all(out_dir).await?;

    let cmd = FfmpegCommand::new(video_path, out_dir.join(FRAME_PATTERN))
        .video_filter(format!("fps={}", fps))
        .log_level("error");

    FfmpegRunner::new().run(&cmd).await?;

    let frames = collect_frame_files(out_dir).await?;
    info!(
        video = %video_path.display(),
        frames = frames.len(),
        fps,
        "Extracted frames"
    );

    Ok(frames)
}

/// List extracted frame files in `dir`, sorted by file name.
pub async fn collect_frame_files(dir: impl AsRef<Path>) -> MediaResult<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let mut entries = fs::read_dir(dir).await?;
    let mut frames = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_frame = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with(FRAME_PREFIX) && n.ends_with(".png"))
            .unwrap_or(false);
        if is_frame {
            frames.push(path);
        }
    }

    frames.sort();
    Ok(frames)
}
