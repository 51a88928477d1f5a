//! Fuzz target: `Segmenter::try_segment`
//!
//! The first two bytes pick the frame size, the third the threshold
//! mode; the rest are pixels.  The segmenter must never panic, every
//! accepted region must respect the configured bounds, and two runs over
//! the same frame must agree.
//!
//! cargo fuzz run fuzz_segmenter

#![no_main]

use frothctl::config::{ThresholdMethod, VisionConfig};
use frothctl::vision::{Frame, Segmenter};
use image::GrayImage;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let [w, h, mode, pixels @ ..] = data else {
        return;
    };
    let (w, h) = (u32::from(*w % 64) + 1, u32::from(*h % 64) + 1);
    let needed = (w * h) as usize;
    if pixels.len() < needed {
        return;
    }
    let Some(img) = GrayImage::from_raw(w, h, pixels[..needed].to_vec()) else {
        return;
    };

    let config = VisionConfig {
        threshold: if mode & 1 == 0 {
            ThresholdMethod::Otsu
        } else {
            ThresholdMethod::AdaptiveMean {
                block_size: 3 + 2 * u32::from(mode >> 4),
                offset: i16::from(mode & 0x0E) - 7,
            }
        },
        invert_threshold: mode & 0x02 == 0,
        min_bubble_area: 4.0,
        min_circularity: 0.0,
        ..VisionConfig::default()
    };
    let segmenter = Segmenter::new(&config);
    let frame = Frame::gray(img, 0);

    let Ok(first) = segmenter.try_segment(&frame) else {
        return;
    };
    for region in &first.regions {
        assert!(region.area >= config.min_bubble_area);
        assert!(region.area <= config.max_bubble_area);
        assert!(region.circularity.is_finite());
    }
    let second = segmenter.try_segment(&frame).ok();
    assert_eq!(Some(first), second, "segmentation must be deterministic");
});
