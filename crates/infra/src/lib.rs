//! Infrastructure layer: contact storage, identity resolution, configuration.

pub mod config;
pub mod contact_store;
pub mod resolver;


pub use config::{AppConfig, ConfigError};
pub use contact_store::{ContactStore, ContactStoreError, InMemoryContactStore, PostgresContactStore};
pub use resolver::{IdentityResolver, MergeStrategy, ResolveError, UnknownMergeStrategy};
