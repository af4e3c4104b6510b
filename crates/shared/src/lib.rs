//! Shared utilities and common types for the school onboarding backend.
//!
//! This crate provides common functionality used across all other crates:
//! - Invitation code and account credential generation
//! - Password generation and hashing with Argon2id
//! - Offset pagination
//! - Common validation logic

pub mod codes;
pub mod pagination;
pub mod password;
pub mod validation;
