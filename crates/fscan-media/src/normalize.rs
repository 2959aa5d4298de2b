//! Idempotent in-place frame normalization.

use std::path::Path;

use tokio::fs;
use tracing::debug;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::probe::probe_image;

/// Build the scale filter that shrinks a frame to fit within the bounds
/// without enlarging smaller frames.
fn fit_filter(max_width: u32, max_height: u32) -> String {
    format!(
        "scale=min(iw\\,{}):min(ih\\,{}):force_original_aspect_ratio=decrease",
        max_width, max_height
    )
}

/// Rewrite `path` in place so it fits within `max_width` x `max_height`.
///
/// Frames that already comply are left untouched, so repeated normalization
/// is a no-op. The resized image is written to a temp file beside the
/// original and renamed over it, keeping the frame's name and therefore its
/// position in the sequence. Returns whether a resize happened.
pub async fn normalize_frame(
    path: impl AsRef<Path>,
    max_width: u32,
    max_height: u32,
) -> MediaResult<bool> {
    let path = path.as_ref();

    let info = probe_image(path).await?;
    if info.fits_within(max_width, max_height) {
        debug!(
            frame = %path.display(),
            width = info.width,
            height = info.height,
            "Frame already within bounds"
        );
        return Ok(false);
    }

    // Temp file in the same directory keeps the final rename on one filesystem.
    let tmp = path.with_extension("resized.png");

    let cmd = FfmpegCommand::new(path, &tmp)
        .video_filter(fit_filter(max_width, max_height))
        .log_level("error");

    if let Err(e) = FfmpegRunner::new().run(&cmd).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e);
    }

    fs::rename(&tmp, path).await?;

    debug!(
        frame = %path.display(),
        from_width = info.width,
        from_height = info.height,
        max_width,
        max_height,
        "Resized frame in place"
    );

    Ok(true)
}
