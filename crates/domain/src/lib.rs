//! Domain layer for the school onboarding backend.
//!
//! This crate contains:
//! - Domain models (Invitation, RegistrationRequest, Account, Course)
//! - Domain error types
//! - Persistence ports and the unit-of-work abstraction
//! - Outbound collaborator ports (mailer, notifier)

pub mod errors;
pub mod models;
pub mod services;
pub mod store;

pub use errors::{OnboardingError, StoreError};
