//! `idlink-core`: shared primitives for the identity reconciliation workspace.
//!
//! This crate contains **pure** building blocks (no infrastructure concerns).

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::ContactId;
