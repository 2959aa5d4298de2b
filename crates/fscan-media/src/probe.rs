//! FFprobe image information.

use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::error::{MediaError, MediaResult};

/// Image file information.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl ImageInfo {
    /// Whether the image already fits within the given bounds.
    pub fn fits_within(&self, max_width: u32, max_height: u32) -> bool {
        self.width <= max_width && self.height <= max_height
    }
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    width: Option<u32>,
    height: Option<u32>,
}

/// Probe an image file for its dimensions.
pub async fn probe_image(path: impl AsRef<Path>) -> MediaResult<ImageInfo> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    crate::command::check_ffprobe()?;

    let output = Command::new("ffprobe")
        .args(["-v", "quiet", "-print_format", "json", "-show_streams"])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::ffprobe_failed(
            "FFprobe failed",
            Some(String::from_utf8_lossy(&output.stderr).to_string()),
        ));
    }

    parse_probe_output(&output.stdout)
}

/// Parse FFprobe JSON into image dimensions.
fn parse_probe_output(stdout: &[u8]) -> MediaResult<ImageInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)?;

    // Still images report a single video stream (codec png/mjpeg/...)
    let stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| MediaError::invalid_image("No image stream found"))?;

    match (stream.width, stream.height) {
        (Some(width), Some(height)) => Ok(ImageInfo { width, height }),
        _ => Err(MediaError::invalid_image("Stream has no dimensions")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_probe_output() {
        let json = br#"{"streams":[{"codec_type":"video","codec_name":"png","width":800,"height":600}]}"#;
        let info = parse_probe_output(json).unwrap();
        assert_eq!(info, ImageInfo { width: 800, height: 600 });
    }

    #[test]
    fn test_parse_probe_output_no_stream() {
        let json = br#"{"streams":[{"codec_type":"audio"}]}"#;
        assert!(parse_probe_output(json).is_err());
    }

    #[test]
    fn test_fits_within() {
        let info = ImageInfo { width: 512, height: 384 };
        assert!(info.fits_within(512, 512));
        assert!(!info.fits_within(511, 512));
        assert!(!info.fits_within(512, 383));
    }
}
