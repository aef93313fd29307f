//! RegistrationStore - ticket registrations
//!
//! ## Responsibilities
//!
//! - Registration lookup by identifier (exact match)
//! - Optional single-use stamp of `verified_at`
//!
//! Registrations are created by the enrollment process; nothing in the
//! check-in flow creates or deletes them.

mod repository;
mod types;

pub use repository::RegistrationRepository;
pub use types::*;
