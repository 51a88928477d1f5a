//! Camera adapters.
//!
//! | Adapter               | Source                                  |
//! |-----------------------|-----------------------------------------|
//! | `ImageSequenceCamera` | JPEG/PNG files replayed from a directory |
//! | `SyntheticFrothCamera`| Generated dark-bubble froth frames       |

use std::path::{Path, PathBuf};

use image::{GrayImage, ImageReader, Luma};
use log::{info, warn};

use crate::app::ports::{CameraPort, CaptureError};
use crate::vision::frame::Frame;

// ───────────────────────────────────────────────────────────────
// Image sequence
// ───────────────────────────────────────────────────────────────

/// Replays still images in file-name order, looping at the end.
pub struct ImageSequenceCamera {
    files: Vec<PathBuf>,
    next: usize,
}

impl ImageSequenceCamera {
    /// Collect every `.png` / `.jpg` / `.jpeg` under `dir`.
    pub fn open(dir: &Path) -> Result<Self, CaptureError> {
        let entries = std::fs::read_dir(dir).map_err(|e| {
            warn!("Frame directory {} unreadable: {}", dir.display(), e);
            CaptureError::DeviceUnavailable
        })?;
        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| matches!(ext.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg"))
            })
            .collect();
        files.sort();
        if files.is_empty() {
            warn!("No frames found in {}", dir.display());
            return Err(CaptureError::DeviceUnavailable);
        }
        info!("Replaying {} frames from {}", files.len(), dir.display());
        Ok(Self { files, next: 0 })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl CameraPort for ImageSequenceCamera {
    fn grab(&mut self, now_ms: u64) -> Result<Frame, CaptureError> {
        let path = &self.files[self.next];
        self.next = (self.next + 1) % self.files.len();
        let image = ImageReader::open(path)
            .map_err(|_| CaptureError::NoFrame)?
            .decode()
            .map_err(|e| {
                warn!("Decode {} failed: {}", path.display(), e);
                CaptureError::DecodeFailed
            })?;
        Ok(Frame::rgb(image.to_rgb8(), now_ms))
    }
}

// ───────────────────────────────────────────────────────────────
// Synthetic froth
// ───────────────────────────────────────────────────────────────

/// Lamella (background) and bubble intensities of generated frames.
const LAMELLA_LEVEL: u8 = 205;
const BUBBLE_LEVEL: u8 = 55;

/// Deterministic froth generator for bench runs.
///
/// Bubbles sit on a jittered grid so they never touch.  `occupancy` sets
/// the fraction of grid cells holding a bubble, which is the knob that
/// moves the bubble count.
pub struct SyntheticFrothCamera {
    width: u32,
    height: u32,
    min_radius: u32,
    max_radius: u32,
    occupancy: f32,
    /// Every n-th grab fails, to exercise the retry path.
    fail_every: Option<u32>,
    grabs: u32,
    rng: u64,
}

impl SyntheticFrothCamera {
    pub fn new(width: u32, height: u32, seed: u64) -> Self {
        Self {
            width,
            height,
            min_radius: 8,
            max_radius: 14,
            occupancy: 0.6,
            fail_every: None,
            grabs: 0,
            rng: seed | 1,
        }
    }

    pub fn with_radius(mut self, min: u32, max: u32) -> Self {
        self.min_radius = min.max(1);
        self.max_radius = max.max(self.min_radius);
        self
    }

    pub fn with_failures(mut self, every: u32) -> Self {
        self.fail_every = (every > 0).then_some(every);
        self
    }

    pub fn set_occupancy(&mut self, occupancy: f32) {
        self.occupancy = occupancy.clamp(0.0, 1.0);
    }

    fn next_u32(&mut self) -> u32 {
        // xorshift64*
        self.rng ^= self.rng >> 12;
        self.rng ^= self.rng << 25;
        self.rng ^= self.rng >> 27;
        (self.rng.wrapping_mul(0x2545_F491_4F6C_DD1D) >> 32) as u32
    }

    fn unit(&mut self) -> f32 {
        self.next_u32() as f32 / u32::MAX as f32
    }

    /// Render one frame.
    pub fn render(&mut self) -> GrayImage {
        let mut img = GrayImage::from_pixel(self.width, self.height, Luma([LAMELLA_LEVEL]));
        let cell = 2 * self.max_radius + 6;
        let jitter = 2.0;
        for gy in 0..self.height / cell {
            for gx in 0..self.width / cell {
                if self.unit() >= self.occupancy {
                    continue;
                }
                let span = (self.max_radius - self.min_radius + 1) as f32;
                let r = self.min_radius as f32 + (self.unit() * span).floor().min(span - 1.0);
                let cx = (gx * cell + cell / 2) as f32 + (self.unit() - 0.5) * 2.0 * jitter;
                let cy = (gy * cell + cell / 2) as f32 + (self.unit() - 0.5) * 2.0 * jitter;
                draw_disc(&mut img, cx, cy, r);
            }
        }
        img
    }
}

fn draw_disc(img: &mut GrayImage, cx: f32, cy: f32, r: f32) {
    let x0 = (cx - r).floor().max(0.0) as u32;
    let y0 = (cy - r).floor().max(0.0) as u32;
    let x1 = ((cx + r).ceil() as u32).min(img.width().saturating_sub(1));
    let y1 = ((cy + r).ceil() as u32).min(img.height().saturating_sub(1));
    for y in y0..=y1 {
        for x in x0..=x1 {
            let (dx, dy) = (x as f32 - cx, y as f32 - cy);
            if dx * dx + dy * dy <= r * r {
                img.put_pixel(x, y, Luma([BUBBLE_LEVEL]));
            }
        }
    }
}

impl CameraPort for SyntheticFrothCamera {
    fn grab(&mut self, now_ms: u64) -> Result<Frame, CaptureError> {
        self.grabs = self.grabs.wrapping_add(1);
        if self.fail_every.is_some_and(|n| self.grabs % n == 0) {
            return Err(CaptureError::NoFrame);
        }
        Ok(Frame::gray(self.render(), now_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_frames() {
        let mut a = SyntheticFrothCamera::new(160, 120, 7);
        let mut b = SyntheticFrothCamera::new(160, 120, 7);
        assert_eq!(a.render(), b.render());
    }

    #[test]
    fn empty_froth_at_zero_occupancy() {
        let mut cam = SyntheticFrothCamera::new(160, 120, 7);
        cam.set_occupancy(0.0);
        assert!(cam.render().pixels().all(|p| p[0] == LAMELLA_LEVEL));
    }

    #[test]
    fn injected_failures() {
        let mut cam = SyntheticFrothCamera::new(64, 64, 1).with_failures(2);
        assert!(cam.grab(0).is_ok());
        assert_eq!(cam.grab(1).unwrap_err(), CaptureError::NoFrame);
        assert!(cam.grab(2).is_ok());
    }

    #[test]
    fn missing_directory_is_unavailable() {
        let err = ImageSequenceCamera::open(Path::new("/nonexistent/frames")).err();
        assert_eq!(err, Some(CaptureError::DeviceUnavailable));
    }

    #[test]
    fn replays_png_files() {
        let dir = std::env::temp_dir().join(format!("frothctl-frames-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let mut synth = SyntheticFrothCamera::new(80, 60, 3);
        synth.render().save(dir.join("0001.png")).unwrap();
        let mut cam = ImageSequenceCamera::open(&dir).unwrap();
        assert_eq!(cam.len(), 1);
        let frame = cam.grab(42).unwrap();
        assert_eq!((frame.width(), frame.height()), (80, 60));
        assert_eq!(frame.captured_at_ms, 42);
        let _ = std::fs::remove_dir_all(dir);
    }
}
