//! Archivum persistence: SurrealDB connection management, schema
//! migrations, repository implementations of the `archivum-core` traits
//! and a filesystem blob store.

mod blob;
mod connection;
mod error;
mod query;
mod schema;

pub mod repository;

pub use blob::{LocalBlobStore, StorageConfig};
pub use connection::{DbConfig, DbManager};
pub use error::DbError;
pub use schema::{run_migrations, schema_v1};
