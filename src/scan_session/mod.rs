//! ScanSession - one scan attempt from camera open to verification result
//!
//! ## Responsibilities
//!
//! - Acquire capture, drive the sampler, release capture
//! - Latch the first candidate and forward it to verification exactly once
//! - Publish state transitions to observers
//!
//! ## Design
//!
//! - `scanned_once` is an atomic latch; later candidates are dropped
//! - The sampler task owns the `CaptureHandle`, so every exit path of the
//!   task (candidate, close, stream end, drop) releases the camera once
//! - Verification runs in its own task; its result is applied only while
//!   the session is still `Verifying`, so a closed session discards it
//! - `Error(kind)` is terminal except for re-opening after a capture
//!   failure and re-submitting the latched candidate after a transport failure

mod types;

#[cfg(test)]
mod tests;

pub use types::*;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::capture::{CaptureBackend, CaptureHandle, DeviceRegistry, VideoStream};
use crate::decoder::LazyDecoder;
use crate::frame_sampler::{DarkPixelGate, FrameGate, FrameSampler, Tick};
use crate::models::ErrorKind;
use crate::verification_service::Verifier;

/// Everything a session needs from its surroundings
pub struct ScanEnvironment<B: CaptureBackend, V: Verifier> {
    pub backend: Arc<B>,
    pub verifier: Arc<V>,
    pub devices: Arc<DeviceRegistry>,
    pub decoder: Arc<LazyDecoder>,
    pub gate: Arc<dyn FrameGate>,
    pub config: ScanConfig,
}

impl<B: CaptureBackend, V: Verifier> ScanEnvironment<B, V> {
    /// Environment with the shared QR decoder and the default dark-pixel gate
    pub fn new(backend: Arc<B>, verifier: Arc<V>) -> Self {
        Self {
            backend,
            verifier,
            devices: Arc::new(DeviceRegistry::new()),
            decoder: LazyDecoder::shared(),
            gate: Arc::new(DarkPixelGate::default()),
            config: ScanConfig::default(),
        }
    }

    pub fn with_decoder(mut self, decoder: Arc<LazyDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn with_gate(mut self, gate: Arc<dyn FrameGate>) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_config(mut self, config: ScanConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_devices(mut self, devices: Arc<DeviceRegistry>) -> Self {
        self.devices = devices;
        self
    }
}

impl<B: CaptureBackend, V: Verifier> Clone for ScanEnvironment<B, V> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            verifier: self.verifier.clone(),
            devices: self.devices.clone(),
            decoder: self.decoder.clone(),
            gate: self.gate.clone(),
            config: self.config.clone(),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// State shared between the session, its sampler task and its verification task
struct SessionInner<V: Verifier> {
    id: Uuid,
    verifier: Arc<V>,
    verify_timeout: Duration,
    scanned_once: AtomicBool,
    state: watch::Sender<ScanState>,
    stop: watch::Sender<bool>,
    candidate: Mutex<Option<String>>,
    last_error: Mutex<Option<ErrorKind>>,
}

impl<V: Verifier> SessionInner<V> {
    fn current(&self) -> ScanState {
        self.state.borrow().clone()
    }

    fn is_latched(&self) -> bool {
        self.scanned_once.load(Ordering::SeqCst)
    }

    /// Move to `next` unless the session is closed
    fn transition(&self, next: ScanState) -> bool {
        let id = self.id;
        self.state.send_if_modified(|state| {
            if *state == ScanState::Closed {
                return false;
            }
            tracing::debug!(session_id = %id, from = state.name(), to = next.name(), "Scan state transition");
            *state = next;
            true
        })
    }

    fn fail(&self, kind: ErrorKind) {
        if self.transition(ScanState::Error(kind)) {
            *lock(&self.last_error) = Some(kind);
            tracing::warn!(session_id = %self.id, error = %kind, "Scan session failed");
        }
    }

    /// Fail only while the session still holds the camera
    fn fail_capture(&self, kind: ErrorKind) {
        let failed = self.state.send_if_modified(|state| {
            if !state.holds_capture() {
                return false;
            }
            *state = ScanState::Error(kind);
            true
        });
        if failed {
            *lock(&self.last_error) = Some(kind);
            tracing::warn!(session_id = %self.id, error = %kind, "Capture lost");
        }
    }

    fn note_error(&self, kind: ErrorKind) {
        *lock(&self.last_error) = Some(kind);
    }

    /// Latch `text` and start verification; `false` if already latched
    fn on_candidate(self: &Arc<Self>, text: String) -> bool {
        if self.current().is_terminal() {
            tracing::debug!(session_id = %self.id, "Candidate ignored, session finished");
            return false;
        }
        if self
            .scanned_once
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!(session_id = %self.id, "Candidate dropped, session already latched");
            return false;
        }

        // Sampler exits and drops the capture
        self.stop.send_replace(true);

        tracing::info!(session_id = %self.id, len = text.len(), "Candidate detected");
        *lock(&self.candidate) = Some(text.clone());
        self.transition(ScanState::Detected {
            candidate: text.clone(),
        });
        if self.transition(ScanState::Verifying {
            candidate: text.clone(),
        }) {
            self.spawn_verification(text);
        }
        true
    }

    /// Error(Network|Server) -> Verifying, atomically
    fn begin_retry(&self) -> Option<String> {
        let candidate = lock(&self.candidate).clone()?;
        let next = ScanState::Verifying {
            candidate: candidate.clone(),
        };
        let moved = self.state.send_if_modified(|state| match state {
            ScanState::Error(kind) if kind.is_retryable() => {
                *state = next;
                true
            }
            _ => false,
        });
        moved.then_some(candidate)
    }

    fn spawn_verification(self: &Arc<Self>, candidate: String) {
        let inner = self.clone();
        tokio::spawn(async move { inner.run_verification(candidate).await });
    }

    async fn run_verification(self: Arc<Self>, candidate: String) {
        tracing::debug!(session_id = %self.id, "Verification request sent");

        let next = match tokio::time::timeout(self.verify_timeout, self.verifier.verify(&candidate)).await {
            Ok(Ok(result)) => {
                tracing::info!(
                    session_id = %self.id,
                    registered = result.registered,
                    already_checked_in = result.already_checked_in,
                    "Verification completed"
                );
                ScanState::Result(result)
            }
            Ok(Err(e)) => {
                tracing::warn!(session_id = %self.id, error = %e, "Verification failed");
                ScanState::Error(e.kind())
            }
            Err(_) => {
                tracing::warn!(
                    session_id = %self.id,
                    timeout_ms = self.verify_timeout.as_millis() as u64,
                    "Verification timed out"
                );
                ScanState::Error(ErrorKind::NetworkError)
            }
        };

        let error = match &next {
            ScanState::Error(kind) => Some(*kind),
            _ => None,
        };
        let applied = self.state.send_if_modified(|state| {
            if !matches!(state, ScanState::Verifying { .. }) {
                return false;
            }
            *state = next;
            true
        });

        if !applied {
            tracing::debug!(session_id = %self.id, "Session moved on, verification result discarded");
        } else if let Some(kind) = error {
            self.note_error(kind);
        }
    }
}

/// Sampler loop; owns the capture until it returns
async fn run_sampler<S, V>(
    inner: Arc<SessionInner<V>>,
    mut capture: CaptureHandle<S>,
    mut sampler: FrameSampler,
    decoder: Arc<LazyDecoder>,
) where
    S: VideoStream,
    V: Verifier,
{
    let mut stop = inner.stop.subscribe();
    inner.state.send_if_modified(|state| {
        if *state != ScanState::Streaming {
            return false;
        }
        *state = ScanState::Sampling;
        true
    });
    let mut decoder_warned = false;

    loop {
        if *stop.borrow() || inner.is_latched() {
            break;
        }

        let presented = tokio::select! {
            _ = stop.changed() => break,
            presented = capture.stream_mut().presented() => presented,
        };
        if !presented {
            tracing::warn!(session_id = %inner.id, "Video source ended");
            inner.fail_capture(ErrorKind::AcquisitionAborted);
            break;
        }
        if *stop.borrow() || inner.is_latched() {
            break;
        }

        match sampler.tick(capture.stream_mut(), &decoder).await {
            Tick::Candidate(candidate) => {
                inner.on_candidate(candidate.data);
                break;
            }
            Tick::DecoderUnavailable(e) => {
                inner.note_error(e.kind());
                if !decoder_warned {
                    tracing::warn!(session_id = %inner.id, error = %e, "Decoder unavailable, frames not decoded");
                    decoder_warned = true;
                }
            }
            Tick::NoNewFrame | Tick::Gated { .. } | Tick::NoCandidate { .. } => {}
        }
    }

    let stats = sampler.stats();
    tracing::debug!(
        session_id = %inner.id,
        ticks = stats.ticks,
        sampled = stats.sampled,
        gated = stats.gated,
        decoded = stats.decoded,
        "Sampler stopped"
    );
    drop(capture);
}

/// ScanSession instance
pub struct ScanSession<B: CaptureBackend, V: Verifier> {
    env: ScanEnvironment<B, V>,
    inner: Arc<SessionInner<V>>,
    sampler_task: Option<JoinHandle<()>>,
}

impl<B: CaptureBackend, V: Verifier> ScanSession<B, V> {
    pub fn new(env: ScanEnvironment<B, V>) -> Self {
        let (state, _) = watch::channel(ScanState::Idle);
        let (stop, _) = watch::channel(false);
        let inner = Arc::new(SessionInner {
            id: Uuid::new_v4(),
            verifier: env.verifier.clone(),
            verify_timeout: env.config.verify_timeout(),
            scanned_once: AtomicBool::new(false),
            state,
            stop,
            candidate: Mutex::new(None),
            last_error: Mutex::new(None),
        });

        Self {
            env,
            inner,
            sampler_task: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn state(&self) -> ScanState {
        self.inner.current()
    }

    /// Observe state transitions
    pub fn subscribe(&self) -> watch::Receiver<ScanState> {
        self.inner.state.subscribe()
    }

    /// Whether a candidate has been latched
    pub fn scanned_once(&self) -> bool {
        self.inner.is_latched()
    }

    /// Latched candidate, if any
    pub fn candidate(&self) -> Option<String> {
        lock(&self.inner.candidate).clone()
    }

    pub fn last_error(&self) -> Option<ErrorKind> {
        *lock(&self.inner.last_error)
    }

    /// Acquire the camera and start sampling
    ///
    /// Valid from `Idle`, or from a capture-acquisition `Error` to retry.
    pub async fn open(&mut self) -> Result<(), SessionError> {
        let state = self.inner.current();
        let reopen = matches!(&state, ScanState::Error(kind) if kind.is_capture_error())
            && !self.inner.is_latched();
        if state != ScanState::Idle && !reopen {
            return Err(SessionError::InvalidState {
                action: "open",
                state: state.name(),
            });
        }

        if let Some(task) = self.sampler_task.take() {
            // Prior task already exited on its own (stream ended)
            if let Err(e) = task.await {
                tracing::warn!(session_id = %self.id(), error = %e, "Sampler task ended abnormally");
            }
        }

        let backend = &self.env.backend;
        if !backend.is_supported() {
            return Err(self.capture_failed(ErrorKind::UnsupportedEnvironment));
        }
        if !backend.is_secure_context() {
            return Err(self.capture_failed(ErrorKind::InsecureContext));
        }

        self.inner.transition(ScanState::RequestingCapture);
        tracing::info!(session_id = %self.id(), facing = ?self.env.config.constraints.facing, "Requesting capture");

        let mut stream = match backend.acquire(&self.env.config.constraints).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(session_id = %self.id(), error = %e, "Capture request failed");
                return Err(self.capture_failed(e.kind()));
            }
        };

        let device_id = stream.device_id().to_string();
        let Some(lease) = self.env.devices.try_acquire(&device_id).await else {
            stream.release();
            return Err(self.capture_failed(ErrorKind::DeviceBusy));
        };

        let capture = CaptureHandle::new(stream, lease, self.id());
        *lock(&self.inner.last_error) = None;
        self.inner.transition(ScanState::Streaming);
        tracing::info!(session_id = %self.id(), device_id = %device_id, "Capture granted");

        let sampler = FrameSampler::new(self.env.gate.clone(), self.env.config.decode.clone());
        self.sampler_task = Some(tokio::spawn(run_sampler(
            self.inner.clone(),
            capture,
            sampler,
            self.env.decoder.clone(),
        )));
        Ok(())
    }

    fn capture_failed(&self, kind: ErrorKind) -> SessionError {
        self.inner.fail(kind);
        SessionError::Capture(kind)
    }

    /// Submit a decoded candidate
    ///
    /// Only the first candidate of the session is forwarded; later ones
    /// return `false` and are dropped.
    pub fn on_candidate(&self, text: impl Into<String>) -> bool {
        self.inner.on_candidate(text.into())
    }

    /// Re-submit the latched candidate after a network or server failure
    ///
    /// Does not touch the camera.
    pub fn retry_verification(&self) -> bool {
        match self.inner.begin_retry() {
            Some(candidate) => {
                tracing::info!(session_id = %self.id(), "Re-submitting candidate");
                self.inner.spawn_verification(candidate);
                true
            }
            None => false,
        }
    }

    /// Release the camera and stop; idempotent
    ///
    /// A verification still in flight is discarded when it completes.
    pub async fn close(&mut self) {
        self.inner.stop.send_replace(true);
        if let Some(task) = self.sampler_task.take() {
            if let Err(e) = task.await {
                tracing::warn!(session_id = %self.id(), error = %e, "Sampler task ended abnormally");
            }
        }

        let prev = self.inner.state.send_replace(ScanState::Closed);
        if prev != ScanState::Closed {
            tracing::info!(session_id = %self.id(), from = prev.name(), "Scan session closed");
        }
    }
}

impl<B: CaptureBackend, V: Verifier> Drop for ScanSession<B, V> {
    fn drop(&mut self) {
        // Sampler observes the stop flag and drops the capture
        self.inner.stop.send_replace(true);
    }
}
