//! Viewport capture with blank-frame retry.

use std::time::Duration;

use image::imageops::FilterType;
use log::{debug, warn};

use crate::error::{CaptureError, Result};
use crate::viewer::{Screenshot, Viewer};

/// Attempts before the last (possibly blank) frame is accepted.
pub const BLANK_RETRY_LIMIT: u32 = 3;

pub const BLANK_RETRY_DELAY: Duration = Duration::from_millis(700);

/// Share of near-white pixels at which a frame counts as blank.
pub const BLANK_THRESHOLD: f64 = 0.94;

const SAMPLE_MAX: u32 = 200;
const BRIGHT_CHANNEL: u8 = 245;

/// True when a downscaled sample of the PNG is almost entirely white.
///
/// Undecodable data is reported as not blank so that it is still saved.
pub fn is_blank_png(png: &[u8]) -> bool {
    let decoded = match image::load_from_memory_with_format(png, image::ImageFormat::Png) {
        Ok(decoded) => decoded,
        Err(e) => {
            warn!("Failed to inspect screenshot: {}", e);
            return false;
        }
    };

    let width = decoded.width().clamp(1, SAMPLE_MAX);
    let height = decoded.height().clamp(1, SAMPLE_MAX);
    let sample = decoded
        .resize_exact(width, height, FilterType::Triangle)
        .to_rgb8();

    let total = u64::from(width) * u64::from(height);
    let bright = sample
        .pixels()
        .filter(|pixel| pixel.0.iter().all(|channel| *channel > BRIGHT_CHANNEL))
        .count() as u64;

    bright as f64 / total as f64 >= BLANK_THRESHOLD
}

/// Capture the viewport, retrying while the frame is blank or empty.
///
/// The session must already be attached. Returns the last attempt when every
/// attempt was blank; fails only when no attempt produced any data.
pub async fn capture_until_not_blank(viewer: &dyn Viewer, retry_delay: Duration) -> Result<Screenshot> {
    let mut latest: Option<Screenshot> = None;

    for attempt in 1..=BLANK_RETRY_LIMIT {
        let screenshot = viewer.capture_viewport().await?;
        if screenshot.png.is_empty() {
            debug!("Empty screenshot payload (attempt {})", attempt);
            tokio::time::sleep(retry_delay).await;
            continue;
        }
        if !is_blank_png(&screenshot.png) {
            return Ok(screenshot);
        }
        warn!("Detected blank screenshot, retrying... ({}/{})", attempt, BLANK_RETRY_LIMIT);
        latest = Some(screenshot);
        tokio::time::sleep(retry_delay).await;
    }

    latest.ok_or_else(|| CaptureError::Transport("Screenshot data is empty, try again later".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use std::io::Cursor;

    fn png(width: u32, height: u32, dark_rows: u32) -> Vec<u8> {
        let img = ImageBuffer::from_fn(width, height, |_, y| {
            if y < dark_rows {
                Rgb([20u8, 40, 60])
            } else {
                Rgb([255u8, 255, 255])
            }
        });
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_white_frame_is_blank() {
        assert!(is_blank_png(&png(400, 300, 0)));
    }

    #[test]
    fn test_content_frame_is_not_blank() {
        assert!(!is_blank_png(&png(100, 100, 50)));
    }

    #[test]
    fn test_mostly_white_frame_at_threshold() {
        // 3 dark rows out of 100 keep 97% of the pixels bright
        assert!(is_blank_png(&png(100, 100, 3)));
    }

    #[test]
    fn test_garbage_is_not_blank() {
        assert!(!is_blank_png(b"not a png"));
    }
}
