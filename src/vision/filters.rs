//! Pixel-level stages of the segmenter: blur, binarisation, morphology.
//!
//! Binary masks are plain [`GrayImage`]s holding [`FOREGROUND`] or 0.

use image::{GrayImage, Luma};

use crate::config::ThresholdMethod;
use crate::error::SegmentationFailure;

/// Mask value for foreground pixels.
pub const FOREGROUND: u8 = 255;

/// Odd, non-zero kernel sizes only.
pub fn check_kernel(size: u32) -> Result<(), SegmentationFailure> {
    if size == 0 || size % 2 == 0 {
        return Err(SegmentationFailure::InvalidKernel(size));
    }
    Ok(())
}

// ── Gaussian blur ─────────────────────────────────────────────────

/// Normalised 1-D Gaussian weights.  Sigma follows the usual
/// kernel-size rule `0.3·((k−1)/2 − 1) + 0.8`.
fn gaussian_weights(size: u32) -> Vec<f32> {
    let sigma = 0.3 * ((size as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let half = (size / 2) as i32;
    let denom = 2.0 * sigma * sigma;
    let mut weights: Vec<f32> = (-half..=half)
        .map(|x| (-((x * x) as f32) / denom).exp())
        .collect();
    let sum: f32 = weights.iter().sum();
    for w in &mut weights {
        *w /= sum;
    }
    weights
}

/// Separable Gaussian blur with replicated borders.  `size == 1` is the
/// identity.
pub fn gaussian_blur(src: &GrayImage, size: u32) -> Result<GrayImage, SegmentationFailure> {
    check_kernel(size)?;
    if size == 1 {
        return Ok(src.clone());
    }
    let (w, h) = src.dimensions();
    let weights = gaussian_weights(size);
    let half = (size / 2) as i64;
    let (wi, hi) = (w as i64, h as i64);

    let mut horizontal = vec![0.0f32; (w * h) as usize];
    for y in 0..h {
        for x in 0..wi {
            let mut acc = 0.0;
            for (k, weight) in weights.iter().enumerate() {
                let sx = (x + k as i64 - half).clamp(0, wi - 1) as u32;
                acc += weight * src.get_pixel(sx, y)[0] as f32;
            }
            horizontal[(y * w) as usize + x as usize] = acc;
        }
    }

    let mut out = GrayImage::new(w, h);
    for y in 0..hi {
        for x in 0..w {
            let mut acc = 0.0;
            for (k, weight) in weights.iter().enumerate() {
                let sy = (y + k as i64 - half).clamp(0, hi - 1) as u32;
                acc += weight * horizontal[(sy * w + x) as usize];
            }
            out.put_pixel(x, y as u32, Luma([acc.round().clamp(0.0, 255.0) as u8]));
        }
    }
    Ok(out)
}

// ── Thresholding ──────────────────────────────────────────────────

/// Binarise according to `method`.  With `invert` set, pixels at or below
/// the threshold become foreground.
pub fn threshold(src: &GrayImage, method: ThresholdMethod, invert: bool) -> GrayImage {
    match method {
        ThresholdMethod::Otsu => match otsu_level(src) {
            Some(level) => binarise(src, invert, |_, _| level as f32),
            // A single grey level carries no froth/background split.
            None => GrayImage::new(src.width(), src.height()),
        },
        ThresholdMethod::AdaptiveMean { block_size, offset } => {
            let means = LocalMean::new(src, block_size);
            binarise(src, invert, |x, y| means.at(x, y) - offset as f32)
        }
    }
}

fn binarise(src: &GrayImage, invert: bool, level: impl Fn(u32, u32) -> f32) -> GrayImage {
    let mut out = GrayImage::new(src.width(), src.height());
    for (x, y, px) in src.enumerate_pixels() {
        let above = px[0] as f32 > level(x, y);
        if above != invert {
            out.put_pixel(x, y, Luma([FOREGROUND]));
        }
    }
    out
}

/// Otsu's between-class-variance maximiser.  `None` when the image has a
/// single grey level.
pub fn otsu_level(src: &GrayImage) -> Option<u8> {
    let mut hist = [0u64; 256];
    for px in src.pixels() {
        hist[px[0] as usize] += 1;
    }
    if hist.iter().filter(|&&c| c > 0).count() < 2 {
        return None;
    }

    let total: u64 = hist.iter().sum();
    let sum_all: f64 = hist.iter().enumerate().map(|(i, &c)| i as f64 * c as f64).sum();
    let mut sum_bg = 0.0f64;
    let mut weight_bg = 0u64;
    let mut best = 0.0f64;
    let mut level = 0u8;

    for (t, &count) in hist.iter().enumerate() {
        weight_bg += count;
        if weight_bg == 0 {
            continue;
        }
        let weight_fg = total - weight_bg;
        if weight_fg == 0 {
            break;
        }
        sum_bg += t as f64 * count as f64;
        let mean_bg = sum_bg / weight_bg as f64;
        let mean_fg = (sum_all - sum_bg) / weight_fg as f64;
        let between = weight_bg as f64 * weight_fg as f64 * (mean_bg - mean_fg).powi(2);
        if between > best {
            best = between;
            level = t as u8;
        }
    }
    Some(level)
}

/// Box mean over a `block × block` window, via an integral image.  Windows
/// are cropped at the borders and averaged over the pixels they cover.
struct LocalMean {
    integral: Vec<u64>,
    width: u32,
    height: u32,
    half: u32,
}

impl LocalMean {
    fn new(src: &GrayImage, block: u32) -> Self {
        let (w, h) = src.dimensions();
        let stride = (w + 1) as usize;
        let mut integral = vec![0u64; stride * (h + 1) as usize];
        for y in 0..h {
            let mut row = 0u64;
            for x in 0..w {
                row += src.get_pixel(x, y)[0] as u64;
                let i = (y + 1) as usize * stride + (x + 1) as usize;
                integral[i] = integral[i - stride] + row;
            }
        }
        Self {
            integral,
            width: w,
            height: h,
            half: block / 2,
        }
    }

    fn at(&self, x: u32, y: u32) -> f32 {
        let x0 = x.saturating_sub(self.half) as usize;
        let y0 = y.saturating_sub(self.half) as usize;
        let x1 = (x + self.half + 1).min(self.width) as usize;
        let y1 = (y + self.half + 1).min(self.height) as usize;
        let stride = (self.width + 1) as usize;
        let sum = self.integral[y1 * stride + x1] + self.integral[y0 * stride + x0]
            - self.integral[y0 * stride + x1]
            - self.integral[y1 * stride + x0];
        let count = ((x1 - x0) * (y1 - y0)) as f32;
        sum as f32 / count
    }
}

// ── Morphology ────────────────────────────────────────────────────

/// Offsets of an elliptical structuring element inscribed in a
/// `size × size` box.  Size 3 gives the 4-neighbour cross.
pub fn ellipse_offsets(size: u32) -> Vec<(i32, i32)> {
    let r = (size / 2) as i32;
    if r == 0 {
        return vec![(0, 0)];
    }
    let rf = r as f32;
    let mut offsets = Vec::new();
    for dy in -r..=r {
        let span = (rf * ((rf * rf - (dy * dy) as f32) / (rf * rf)).sqrt()).round() as i32;
        for dx in -span..=span {
            offsets.push((dx, dy));
        }
    }
    offsets
}

fn is_set(mask: &GrayImage, x: i64, y: i64) -> Option<bool> {
    if x < 0 || y < 0 || x >= mask.width() as i64 || y >= mask.height() as i64 {
        return None;
    }
    Some(mask.get_pixel(x as u32, y as u32)[0] != 0)
}

/// Binary erosion.  Out-of-bounds positions are ignored, so objects
/// touching the frame edge are not eaten from outside.
pub fn erode(mask: &GrayImage, offsets: &[(i32, i32)]) -> GrayImage {
    morph(mask, offsets, |hits, covered| hits == covered)
}

/// Binary dilation.
pub fn dilate(mask: &GrayImage, offsets: &[(i32, i32)]) -> GrayImage {
    morph(mask, offsets, |hits, _| hits > 0)
}

fn morph(mask: &GrayImage, offsets: &[(i32, i32)], keep: impl Fn(usize, usize) -> bool) -> GrayImage {
    let mut out = GrayImage::new(mask.width(), mask.height());
    for y in 0..mask.height() {
        for x in 0..mask.width() {
            let mut hits = 0;
            let mut covered = 0;
            for &(dx, dy) in offsets {
                if let Some(set) = is_set(mask, x as i64 + dx as i64, y as i64 + dy as i64) {
                    covered += 1;
                    if set {
                        hits += 1;
                    }
                }
            }
            if keep(hits, covered) {
                out.put_pixel(x, y, Luma([FOREGROUND]));
            }
        }
    }
    out
}

/// `iterations` erosions followed by as many dilations.
pub fn open(mask: &GrayImage, offsets: &[(i32, i32)], iterations: u8) -> GrayImage {
    let mut out = mask.clone();
    for _ in 0..iterations {
        out = erode(&out, offsets);
    }
    for _ in 0..iterations {
        out = dilate(&out, offsets);
    }
    out
}

/// `iterations` dilations followed by as many erosions.
pub fn close(mask: &GrayImage, offsets: &[(i32, i32)], iterations: u8) -> GrayImage {
    let mut out = mask.clone();
    for _ in 0..iterations {
        out = dilate(&out, offsets);
    }
    for _ in 0..iterations {
        out = erode(&out, offsets);
    }
    out
}

/// Number of foreground pixels.
pub fn count_foreground(mask: &GrayImage) -> usize {
    mask.pixels().filter(|p| p[0] != 0).count()
}
