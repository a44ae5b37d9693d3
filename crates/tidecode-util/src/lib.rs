//! Shared utilities for tidecode.
//!
//! This crate provides common utilities used across the tidecode workspace:
//! - ULID-based identifier generation
//! - Path utilities for workspace-relative file keys

pub mod id;
pub mod path;

pub use id::{IdPrefix, Identifier};
