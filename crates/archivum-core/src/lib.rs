//! Archivum Core: domain models, access control, query building and
//! repository interfaces for the document archive.
//!
//! Nothing in this crate performs I/O. Storage backends implement the
//! traits in [`repository`] and [`storage`].

pub mod access;
pub mod error;
pub mod filter;
pub mod models;
pub mod redaction;
pub mod reference;
pub mod repository;
pub mod storage;

pub use error::{ArchiveError, ArchiveResult};
