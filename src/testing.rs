//! Test doubles for the scan pipeline

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::capture::{CaptureBackend, CaptureConstraints, CaptureError, FrameBuffer, VideoStream};
use crate::decoder::{Candidate, DecodeOptions, Decoder};
use crate::registration_store::Registration;
use crate::verification_service::{VerificationResult, Verifier, VerifyError};

pub(crate) const DARK: [u8; 4] = [0, 0, 0, 255];
pub(crate) const BRIGHT: [u8; 4] = [250, 250, 250, 255];

pub(crate) const SARA_ID: &str = "29901010112345";

pub(crate) fn sara() -> Registration {
    Registration {
        identifier: SARA_ID.to_string(),
        name: "Sara Ahmed".to_string(),
        email: "sara@example.com".to_string(),
        ticket_number: "TKT-0001".to_string(),
        verified_at: None,
    }
}

/// Scripted capture backend
pub(crate) struct MockBackend {
    device_id: String,
    frames: Arc<Vec<FrameBuffer>>,
    failures: Mutex<VecDeque<CaptureError>>,
    secure: bool,
    supported: bool,
    frame_limit: Option<usize>,
    frame_interval: Duration,
    acquisitions: Arc<AtomicUsize>,
    releases: Arc<AtomicUsize>,
}

impl MockBackend {
    pub(crate) fn new(frames: Vec<FrameBuffer>) -> Self {
        Self {
            device_id: "mock-rear".to_string(),
            frames: Arc::new(frames),
            failures: Mutex::new(VecDeque::new()),
            secure: true,
            supported: true,
            frame_limit: None,
            frame_interval: Duration::from_millis(2),
            acquisitions: Arc::new(AtomicUsize::new(0)),
            releases: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Backend presenting a single solid frame
    pub(crate) fn solid(rgba: [u8; 4]) -> Self {
        Self::new(vec![FrameBuffer::filled(16, 16, rgba)])
    }

    pub(crate) fn failing_first(self, errors: Vec<CaptureError>) -> Self {
        *self.failures.lock().unwrap() = errors.into();
        self
    }

    pub(crate) fn insecure(mut self) -> Self {
        self.secure = false;
        self
    }

    pub(crate) fn unsupported(mut self) -> Self {
        self.supported = false;
        self
    }

    /// Stream ends after `n` frames
    pub(crate) fn ending_after(mut self, n: usize) -> Self {
        self.frame_limit = Some(n);
        self
    }

    pub(crate) fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }

    /// Number of `release` calls across all streams
    pub(crate) fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

impl CaptureBackend for MockBackend {
    type Stream = MockStream;

    fn is_secure_context(&self) -> bool {
        self.secure
    }

    fn is_supported(&self) -> bool {
        self.supported
    }

    async fn acquire(&self, _constraints: &CaptureConstraints) -> Result<MockStream, CaptureError> {
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(MockStream {
            device_id: self.device_id.clone(),
            frames: self.frames.clone(),
            next: 0,
            current: None,
            remaining: self.frame_limit,
            fresh: false,
            interval: self.frame_interval,
            released: false,
            releases: self.releases.clone(),
        })
    }
}

pub(crate) struct MockStream {
    device_id: String,
    frames: Arc<Vec<FrameBuffer>>,
    next: usize,
    current: Option<usize>,
    remaining: Option<usize>,
    fresh: bool,
    interval: Duration,
    released: bool,
    releases: Arc<AtomicUsize>,
}

impl VideoStream for MockStream {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    async fn presented(&mut self) -> bool {
        if self.released || self.frames.is_empty() || self.remaining == Some(0) {
            return false;
        }
        tokio::time::sleep(self.interval).await;
        if let Some(n) = self.remaining.as_mut() {
            *n -= 1;
        }
        self.current = Some(self.next % self.frames.len());
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
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

/// Decoder that answers every frame the same way
pub(crate) struct CountingDecoder {
    result: Option<String>,
    calls: AtomicUsize,
}

impl CountingDecoder {
    pub(crate) fn returning(result: Option<&str>) -> Self {
        Self {
            result: result.map(str::to_string),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Decoder for CountingDecoder {
    fn decode(&self, _: &[u8], _: u32, _: u32, _: &DecodeOptions) -> Option<Candidate> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone().map(|data| Candidate { data })
    }
}

/// Verifier with a fixed registry, optional latency and scripted failures
pub(crate) struct StubVerifier {
    known: HashMap<String, VerificationResult>,
    delay: Mutex<Duration>,
    failures: Mutex<VecDeque<VerifyError>>,
    seen: Mutex<Vec<String>>,
}

impl StubVerifier {
    pub(crate) fn new() -> Self {
        let mut known = HashMap::new();
        known.insert(SARA_ID.to_string(), VerificationResult::registered(&sara()));
        Self {
            known,
            delay: Mutex::new(Duration::ZERO),
            failures: Mutex::new(VecDeque::new()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_delay(self, delay: Duration) -> Self {
        self.set_delay(delay);
        self
    }

    pub(crate) fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub(crate) fn failing_first(self, errors: Vec<VerifyError>) -> Self {
        *self.failures.lock().unwrap() = errors.into();
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub(crate) fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

impl Verifier for StubVerifier {
    async fn verify(&self, identifier: &str) -> Result<VerificationResult, VerifyError> {
        self.seen.lock().unwrap().push(identifier.to_string());
        let delay = *self.delay.lock().unwrap();
        let failure = self.failures.lock().unwrap().pop_front();

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = failure {
            return Err(err);
        }
        Ok(self
            .known
            .get(identifier)
            .cloned()
            .unwrap_or_else(VerificationResult::not_registered))
    }
}
