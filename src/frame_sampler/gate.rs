//! Frame gates - cheap pre-filters run before decoding

use serde::{Deserialize, Serialize};

use crate::capture::FrameBuffer;

/// Gate verdict for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateDecision {
    /// Scalar signal the verdict was based on
    pub signal: f32,
    pub pass: bool,
}

/// Decides whether a frame is worth decoding
pub trait FrameGate: Send + Sync {
    fn evaluate(&self, frame: &FrameBuffer) -> GateDecision;
}

/// Passes frames whose share of dark pixels is large enough
///
/// A printed code has a substantial share of dark modules; a blank or
/// over-exposed frame has almost none.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DarkPixelGate {
    /// Luma strictly below this counts as dark
    pub brightness_threshold: u8,
    /// Minimum dark fraction, in `[0, 1]`
    pub min_dark_fraction: f32,
}

impl Default for DarkPixelGate {
    fn default() -> Self {
        Self {
            brightness_threshold: 100,
            min_dark_fraction: 0.1,
        }
    }
}

impl DarkPixelGate {
    pub fn new(brightness_threshold: u8, min_dark_fraction: f32) -> Self {
        Self {
            brightness_threshold,
            min_dark_fraction: min_dark_fraction.clamp(0.0, 1.0),
        }
    }

    /// Fraction of pixels darker than the threshold
    pub fn dark_fraction(&self, frame: &FrameBuffer) -> f32 {
        let total = frame.pixel_count();
        if total == 0 {
            return 0.0;
        }
        let dark = frame
            .luma_iter()
            .filter(|&l| l < self.brightness_threshold)
            .count();
        dark as f32 / total as f32
    }
}

impl FrameGate for DarkPixelGate {
    fn evaluate(&self, frame: &FrameBuffer) -> GateDecision {
        let signal = self.dark_fraction(frame);
        GateDecision {
            signal,
            pass: !frame.is_empty() && signal >= self.min_dark_fraction,
        }
    }
}

/// Gate that sends every frame to the decoder
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysDecode;

impl FrameGate for AlwaysDecode {
    fn evaluate(&self, frame: &FrameBuffer) -> GateDecision {
        GateDecision {
            signal: 1.0,
            pass: !frame.is_empty(),
        }
    }
}
