//! Persistence layer for the school onboarding backend.
//!
//! This crate contains:
//! - Database connection management
//! - Entity definitions (database row mappings)
//! - The PostgreSQL unit of work and its store implementations
//! - An in-memory store with the same transactional semantics

pub mod db;
pub mod entities;
pub mod memory;
pub mod metrics;
pub mod postgres;
pub mod repositories;

pub use memory::InMemoryStore;
pub use postgres::{PgOnboardingStore, PgOnboardingTx};
