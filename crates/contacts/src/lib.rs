//! Contacts domain module (identity clusters of email/phone records).
//!
//! This crate contains the data model and the pure parts of identity
//! resolution: request normalization and cluster view assembly. No IO, no
//! HTTP, no storage; the orchestration against a store lives in `idlink-infra`.

pub mod cluster;
pub mod contact;
pub mod request;

pub use cluster::ClusterView;
pub use contact::{Contact, LinkPrecedence, NewContact};
pub use request::{IdentifyRequest, Identifiers};
