//! Capture - camera stream acquisition
//!
//! ## Responsibilities
//!
//! - Request a video stream under `CaptureConstraints`
//! - Map platform failures onto `ErrorKind`
//! - Own the live stream through `CaptureHandle`, which stops it exactly once
//!
//! ## Design
//!
//! - `CaptureBackend` is the platform seam (camera API, still images, test doubles)
//! - `VideoStream::presented` paces sampling at one wake per presented frame
//! - `DeviceRegistry` keeps two sessions off the same device

mod device_registry;
mod still;
mod types;

pub use device_registry::{DeviceLease, DeviceRegistry};
pub use still::{StillImageBackend, StillImageStream};
pub use types::*;

use std::future::Future;
use uuid::Uuid;

/// A live video stream
pub trait VideoStream: Send + 'static {
    /// Identifier of the device backing this stream
    fn device_id(&self) -> &str;

    /// Wait for the next presented frame; `false` once the source has ended
    fn presented(&mut self) -> impl Future<Output = bool> + Send;

    /// Whether a frame newer than the last read is available
    fn has_new_frame(&self) -> bool;

    /// Copy the current frame into `buffer`
    fn read_frame(&mut self, buffer: &mut FrameBuffer);

    /// Stop every track of the stream
    fn release(&mut self);
}

/// Platform capture API
pub trait CaptureBackend: Send + Sync + 'static {
    type Stream: VideoStream;

    /// Camera access is only granted in a secure context
    fn is_secure_context(&self) -> bool {
        true
    }

    /// Whether the environment exposes a capture API at all
    fn is_supported(&self) -> bool {
        true
    }

    /// Request a stream
    fn acquire(
        &self,
        constraints: &CaptureConstraints,
    ) -> impl Future<Output = Result<Self::Stream, CaptureError>> + Send;
}

/// Session-owned capture
///
/// Dropping the handle stops the stream and then frees the device lease.
pub struct CaptureHandle<S: VideoStream> {
    stream: S,
    session_id: Uuid,
    _lease: DeviceLease,
}

impl<S: VideoStream> CaptureHandle<S> {
    pub fn new(stream: S, lease: DeviceLease, session_id: Uuid) -> Self {
        Self {
            stream,
            session_id,
            _lease: lease,
        }
    }

    pub fn stream(&self) -> &S {
        &self.stream
    }

    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }
}

impl<S: VideoStream> Drop for CaptureHandle<S> {
    fn drop(&mut self) {
        self.stream.release();
        tracing::info!(
            session_id = %self.session_id,
            device_id = %self.stream.device_id(),
            "Capture released"
        );
    }
}
