//! Still-image capture source
//!
//! Presents decoded image files as a video stream at a fixed rate.
//! Used by the `checkin` CLI and for replaying captured frames.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, Interval, MissedTickBehavior};

use super::{CaptureBackend, CaptureConstraints, CaptureError, FrameBuffer, VideoStream};

/// Backend that serves frames from images
pub struct StillImageBackend {
    device_id: String,
    frames: Arc<Vec<FrameBuffer>>,
    frame_interval: Duration,
    looping: bool,
}

impl StillImageBackend {
    /// Backend over already-decoded frames
    pub fn from_frames(device_id: impl Into<String>, frames: Vec<FrameBuffer>, fps: u32) -> Self {
        Self {
            device_id: device_id.into(),
            frames: Arc::new(frames),
            frame_interval: frame_interval(fps),
            looping: true,
        }
    }

    /// Backend over image files (PNG or JPEG)
    pub fn from_paths<P: AsRef<Path>>(paths: &[P], fps: u32) -> Result<Self, CaptureError> {
        let mut frames = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            let rgba = image::open(path)
                .map_err(|e| CaptureError::DeviceNotFound(format!("{}: {}", path.display(), e)))?
                .to_rgba8();
            let (width, height) = rgba.dimensions();
            let frame = FrameBuffer::from_rgba(width, height, rgba.into_raw()).ok_or_else(|| {
                CaptureError::Aborted(format!("{}: unexpected pixel layout", path.display()))
            })?;

            tracing::debug!(path = %path.display(), width, height, "Still frame loaded");
            frames.push(frame);
        }

        Ok(Self::from_frames("still-image", frames, fps))
    }

    /// Stop after the last frame instead of cycling
    pub fn once(mut self) -> Self {
        self.looping = false;
        self
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

/// Presentation period for `fps`, never shorter than 1 ms
fn frame_interval(fps: u32) -> Duration {
    (Duration::from_secs(1) / fps.max(1)).max(MIN_FRAME_INTERVAL)
}

const MIN_FRAME_INTERVAL: Duration = Duration::from_millis(1);

impl CaptureBackend for StillImageBackend {
    type Stream = StillImageStream;

    async fn acquire(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<StillImageStream, CaptureError> {
        if self.frames.is_empty() {
            return Err(CaptureError::DeviceNotFound(
                "no still images configured".to_string(),
            ));
        }

        tracing::debug!(
            device_id = %self.device_id,
            facing = ?constraints.facing,
            frames = self.frames.len(),
            "Still-image stream opened"
        );

        let mut ticker = interval(self.frame_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        Ok(StillImageStream {
            device_id: self.device_id.clone(),
            frames: self.frames.clone(),
            ticker,
            looping: self.looping,
            next: 0,
            current: None,
            fresh: false,
            released: false,
        })
    }
}

/// Stream over still frames
pub struct StillImageStream {
    device_id: String,
    frames: Arc<Vec<FrameBuffer>>,
    ticker: Interval,
    looping: bool,
    next: usize,
    current: Option<usize>,
    fresh: bool,
    released: bool,
}

impl StillImageStream {
    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl VideoStream for StillImageStream {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    async fn presented(&mut self) -> bool {
        if self.released {
            return false;
        }
        self.ticker.tick().await;

        if self.next >= self.frames.len() {
            if !self.looping {
                return false;
            }
            self.next = 0;
        }
        self.current = Some(self.next);
        self.next += 1;
        self.fresh = true;
        true
    }

    fn has_new_frame(&self) -> bool {
        self.fresh
    }

    fn read_frame(&mut self, buffer: &mut FrameBuffer) {
        if let Some(frame) = self.current.and_then(|i| self.frames.get(i)) {
            buffer.copy_from(frame);
        }
        self.fresh = false;
    }

    fn release(&mut self) {
        self.released = true;
        tracing::debug!(device_id = %self.device_id, "Still-image stream stopped");
    }
}
