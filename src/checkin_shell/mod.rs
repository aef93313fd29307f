//! CheckinShell - the check-in surface
//!
//! ## Responsibilities
//!
//! - Start and stop scan sessions (at most one per surface)
//! - Manual identifier entry as an alternative to scanning
//! - Render session states and verification outcomes as `CheckinView`
//! - Route the retry affordance to the right recovery
//!
//! ## Design
//!
//! - Every user action bumps a generation counter; a late update from an
//!   earlier action is dropped when its generation is no longer current
//! - The prior session is closed before a new one is created

mod view;

pub use view::{CheckinView, EntrySource};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::capture::CaptureBackend;
use crate::models::{ErrorKind, RetryAction};
use crate::scan_session::{ScanEnvironment, ScanSession, SessionError};
use crate::verification_service::{Verifier, VerifyError};

/// Check-in surface
pub struct CheckinShell<B: CaptureBackend, V: Verifier> {
    env: ScanEnvironment<B, V>,
    active: Option<ScanSession<B, V>>,
    forwarder: Option<JoinHandle<()>>,
    generation: Arc<AtomicU64>,
    view: Arc<watch::Sender<CheckinView>>,
    /// Last manually entered identifier
    manual: Option<String>,
}

impl<B: CaptureBackend, V: Verifier> CheckinShell<B, V> {
    pub fn new(env: ScanEnvironment<B, V>) -> Self {
        let (view, _) = watch::channel(CheckinView::Idle);
        Self {
            env,
            active: None,
            forwarder: None,
            generation: Arc::new(AtomicU64::new(0)),
            view: Arc::new(view),
            manual: None,
        }
    }

    pub fn view(&self) -> CheckinView {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CheckinView> {
        self.view.subscribe()
    }

    pub fn active_session_id(&self) -> Option<Uuid> {
        self.active.as_ref().map(|s| s.id())
    }

    /// Supersede whatever is in flight; returns the new generation
    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Show `view` if `generation` is still current
    fn render(&self, generation: u64, view: CheckinView) -> bool {
        render_if_current(&self.view, &self.generation, generation, view)
    }

    /// Start a camera scan, closing any prior session first
    pub async fn start_scan(&mut self) -> Result<(), SessionError> {
        self.stop_active().await;
        let generation = self.next_generation();

        let session = ScanSession::new(self.env.clone());
        tracing::info!(session_id = %session.id(), generation, "Scan started");
        self.forwarder = Some(self.spawn_forwarder(&session, generation));

        let session = self.active.insert(session);
        session.open().await
    }

    /// Verify a typed identifier
    ///
    /// Cancels any scan in progress; the scan's outcome is never shown
    /// after this call.
    pub async fn submit_manual(&mut self, input: &str) -> CheckinView {
        self.stop_active().await;
        let generation = self.next_generation();

        let identifier = input.trim();
        if identifier.is_empty() {
            let view = CheckinView::failed(ErrorKind::InvalidIdentifier);
            self.render(generation, view.clone());
            return view;
        }

        self.manual = Some(identifier.to_string());
        self.verify_manual(generation, identifier.to_string()).await
    }

    async fn verify_manual(&self, generation: u64, identifier: String) -> CheckinView {
        self.render(
            generation,
            CheckinView::Verifying {
                identifier: identifier.clone(),
                source: EntrySource::Manual,
            },
        );
        tracing::info!(generation, "Manual verification submitted");

        let timeout = self.env.config.verify_timeout();
        let outcome = match tokio::time::timeout(timeout, self.env.verifier.verify(&identifier)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(VerifyError::Network(format!(
                "no response within {} ms",
                timeout.as_millis()
            ))),
        };
        if let Err(e) = &outcome {
            tracing::warn!(generation, error = %e, "Manual verification failed");
        }

        let view = CheckinView::from_outcome(outcome);
        if !self.render(generation, view.clone()) {
            tracing::debug!(generation, "Stale manual result dropped");
        }
        view
    }

    /// Run the recovery offered by the current view
    pub async fn retry(&mut self) -> Result<(), SessionError> {
        let action = match self.view() {
            CheckinView::Failed { retry, .. } => retry,
            CheckinView::NotAdmitted { .. } => RetryAction::NewAttempt,
            _ => RetryAction::None,
        };

        match action {
            RetryAction::ReopenCamera => match self.active.as_mut() {
                Some(session) => session.open().await,
                None => self.start_scan().await,
            },
            RetryAction::ResubmitCandidate => {
                if let Some(session) = self.active.as_ref().filter(|s| s.candidate().is_some()) {
                    if !session.retry_verification() {
                        tracing::debug!(
                            session_id = %session.id(),
                            state = session.state().name(),
                            "Resubmit ignored, session not in a retryable error"
                        );
                    }
                } else if let Some(identifier) = self.manual.clone() {
                    let generation = self.next_generation();
                    self.verify_manual(generation, identifier).await;
                }
                Ok(())
            }
            RetryAction::NewAttempt => self.start_scan().await,
            RetryAction::None => Ok(()),
        }
    }

    /// Close the active session (releases the camera)
    pub async fn stop_active(&mut self) {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
        if let Some(mut session) = self.active.take() {
            session.close().await;
        }
    }

    /// Stop scanning and go back to idle
    pub async fn reset(&mut self) {
        self.stop_active().await;
        let generation = self.next_generation();
        self.manual = None;
        self.render(generation, CheckinView::Idle);
    }

    /// Mirror session states into the view while `generation` is current
    fn spawn_forwarder(&self, session: &ScanSession<B, V>, generation: u64) -> JoinHandle<()> {
        let mut states = session.subscribe();
        let view = self.view.clone();
        let current = self.generation.clone();

        tokio::spawn(async move {
            loop {
                let state = states.borrow_and_update().clone();
                if let Some(next) = CheckinView::from_scan_state(&state) {
                    if !render_if_current(&view, &current, generation, next) {
                        break;
                    }
                }
                if states.changed().await.is_err() {
                    break;
                }
            }
        })
    }
}

fn render_if_current(
    view: &watch::Sender<CheckinView>,
    current: &AtomicU64,
    generation: u64,
    next: CheckinView,
) -> bool {
    let mut applied = false;
    view.send_if_modified(|shown| {
        if current.load(Ordering::SeqCst) != generation {
            return false;
        }
        applied = true;
        if *shown == next {
            return false;
        }
        *shown = next;
        true
    });
    applied
}
