//! Contact storage boundary.
//!
//! The resolver treats the store as the single source of truth and re-reads
//! it on every request. This module defines the trait plus two adapters: an
//! in-memory store for tests/dev and a Postgres store for deployments.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryContactStore;
pub use postgres::PostgresContactStore;
pub use r#trait::{ContactStore, ContactStoreError};
