//! Domain models for Archivum.
//!
//! These are the core types shared across all crates.

pub mod audit;
pub mod correspondence;
pub mod document;
pub mod identity;
pub mod service_scope;
pub mod user;
