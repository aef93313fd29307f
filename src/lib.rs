//! Ticket Gate Library
//!
//! Event check-in: scan or type a ticket identifier, verify it against the
//! registration store, and accept pending applications.
//!
//! ## Architecture
//!
//! Server side:
//!
//! 1. RegistrationStore - registrations keyed by identifier
//! 2. VerificationService - `POST /verify-ticket`
//! 3. ApplicationService - `PUT /join/accept/{id}`
//! 4. WebAPI - REST API endpoints
//!
//! Check-in station:
//!
//! 5. Capture - camera stream acquisition and release
//! 6. Decoder - lazily loaded QR decoding
//! 7. FrameSampler - per-frame gate and decode
//! 8. ScanSession - one scan attempt, exactly-once forwarding
//! 9. VerifyClient - HTTP client for the server
//! 10. CheckinShell - manual entry, retry, stale-result guard

pub mod application_service;
pub mod capture;
pub mod checkin_shell;
pub mod decoder;
pub mod error;
pub mod frame_sampler;
pub mod models;
pub mod registration_store;
pub mod scan_session;
pub mod state;
pub mod verification_service;
pub mod verify_client;
pub mod web_api;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Error, Result};
pub use state::AppState;
