//! Store implementations for the PostgreSQL unit of work.
//!
//! Each module implements one store trait for [`crate::PgOnboardingTx`];
//! every statement runs inside the open transaction.

pub mod account;
pub mod course;
pub mod invitation;
pub mod registration_request;
