//! Capture types

use serde::{Deserialize, Serialize};

use crate::models::ErrorKind;

/// Preferred camera facing
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Rear camera
    Environment,
    /// Front camera
    User,
}

impl Default for FacingMode {
    fn default() -> Self {
        Self::Environment
    }
}

/// Capture request constraints
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CaptureConstraints {
    pub facing: FacingMode,
    /// Ideal width (the device may grant another)
    pub width: u32,
    /// Ideal height
    pub height: u32,
    pub audio: bool,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            facing: FacingMode::Environment,
            width: 1280,
            height: 720,
            audio: false,
        }
    }
}

/// Capture acquisition failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    #[error("Camera permission denied: {0}")]
    PermissionDenied(String),

    #[error("No camera device found: {0}")]
    DeviceNotFound(String),

    #[error("Camera device busy: {0}")]
    DeviceBusy(String),

    #[error("Camera requires a secure context")]
    InsecureContext,

    #[error("Camera acquisition aborted: {0}")]
    Aborted(String),

    #[error("Camera capture unsupported: {0}")]
    Unsupported(String),
}

impl CaptureError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CaptureError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            CaptureError::DeviceNotFound(_) => ErrorKind::DeviceNotFound,
            CaptureError::DeviceBusy(_) => ErrorKind::DeviceBusy,
            CaptureError::InsecureContext => ErrorKind::InsecureContext,
            CaptureError::Aborted(_) => ErrorKind::AcquisitionAborted,
            CaptureError::Unsupported(_) => ErrorKind::UnsupportedEnvironment,
        }
    }
}

/// Rec. 601 luma of an RGB pixel
#[inline]
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((299 * r as u32 + 587 * g as u32 + 114 * b as u32) / 1000) as u8
}

/// Reusable RGBA8 frame buffer
///
/// The sampler keeps one buffer per session and copies each presented
/// frame into it, so steady-state sampling does not allocate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a frame from RGBA bytes; `None` if the length does not match
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        if data.len() != width as usize * height as usize * 4 {
            return None;
        }
        Some(Self {
            width,
            height,
            data,
        })
    }

    /// Solid-color frame
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let data = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self {
            width,
            height,
            data,
        }
    }

    /// Copy another frame in, reusing this buffer's allocation
    pub fn copy_from(&mut self, other: &FrameBuffer) {
        self.width = other.width;
        self.height = other.height;
        self.data.clear();
        self.data.extend_from_slice(&other.data);
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// RGBA bytes, row-major
    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Iterate luma values, one per pixel
    pub fn luma_iter(&self) -> impl Iterator<Item = u8> + '_ {
        self.data.chunks_exact(4).map(|px| luma(px[0], px[1], px[2]))
    }
}
