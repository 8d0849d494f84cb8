use std::sync::Arc;

use thiserror::Error;

use idlink_contacts::{Contact, LinkPrecedence, NewContact};
use idlink_core::{ContactId, DomainError};

/// Contact store error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContactStoreError {
    /// The write was rejected (e.g. a contact with neither email nor phone).
    #[error("validation failed: {0}")]
    Validation(String),
    /// The addressed contact does not exist.
    #[error("contact not found: {0}")]
    NotFound(ContactId),
    /// The backend failed (connection, query, decoding).
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<DomainError> for ContactStoreError {
    fn from(err: DomainError) -> Self {
        ContactStoreError::Validation(err.to_string())
    }
}

/// Contact storage abstraction.
///
/// Every listing is ordered by `(created_at, id)` ascending. Lookups that
/// match nothing return an empty list (or `None`), never an error.
#[async_trait::async_trait]
pub trait ContactStore: Send + Sync {
    /// Contacts whose email equals `email` OR whose phone number equals `phone_number`.
    ///
    /// An absent value matches nothing; both absent yields an empty list.
    async fn find_by_email_or_phone(
        &self,
        email: Option<&str>,
        phone_number: Option<&str>,
    ) -> Result<Vec<Contact>, ContactStoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Vec<Contact>, ContactStoreError>;

    async fn find_by_phone(&self, phone_number: &str) -> Result<Vec<Contact>, ContactStoreError>;

    /// The oldest primary contact carrying `email`, if any.
    async fn find_primary_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Contact>, ContactStoreError>;

    /// The oldest primary contact carrying `phone_number`, if any.
    async fn find_primary_by_phone(
        &self,
        phone_number: &str,
    ) -> Result<Option<Contact>, ContactStoreError>;

    async fn find_by_id(&self, id: ContactId) -> Result<Option<Contact>, ContactStoreError>;

    /// Contacts whose `linked_id` is `id`.
    async fn find_linked_to(&self, id: ContactId) -> Result<Vec<Contact>, ContactStoreError>;

    /// Every contact whose `linked_id` chain leads to `root`, excluding `root`
    /// itself, in a single store round trip.
    async fn find_cluster(&self, root: ContactId) -> Result<Vec<Contact>, ContactStoreError>;

    /// Insert a contact; the store assigns id and timestamps.
    ///
    /// Fails with `Validation` when both email and phone number are absent.
    async fn create(&self, contact: NewContact) -> Result<Contact, ContactStoreError>;

    /// Rewrite a contact's precedence and link, bumping `updated_at`.
    async fn set_precedence(
        &self,
        id: ContactId,
        precedence: LinkPrecedence,
        linked_id: Option<ContactId>,
    ) -> Result<Contact, ContactStoreError>;
}

#[async_trait::async_trait]
impl<S> ContactStore for Arc<S>
where
    S: ContactStore + ?Sized,
{
    async fn find_by_email_or_phone(
        &self,
        email: Option<&str>,
        phone_number: Option<&str>,
    ) -> Result<Vec<Contact>, ContactStoreError> {
        (**self).find_by_email_or_phone(email, phone_number).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Vec<Contact>, ContactStoreError> {
        (**self).find_by_email(email).await
    }

    async fn find_by_phone(&self, phone_number: &str) -> Result<Vec<Contact>, ContactStoreError> {
        (**self).find_by_phone(phone_number).await
    }

    async fn find_primary_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Contact>, ContactStoreError> {
        (**self).find_primary_by_email(email).await
    }

    async fn find_primary_by_phone(
        &self,
        phone_number: &str,
    ) -> Result<Option<Contact>, ContactStoreError> {
        (**self).find_primary_by_phone(phone_number).await
    }

    async fn find_by_id(&self, id: ContactId) -> Result<Option<Contact>, ContactStoreError> {
        (**self).find_by_id(id).await
    }

    async fn find_linked_to(&self, id: ContactId) -> Result<Vec<Contact>, ContactStoreError> {
        (**self).find_linked_to(id).await
    }

    async fn find_cluster(&self, root: ContactId) -> Result<Vec<Contact>, ContactStoreError> {
        (**self).find_cluster(root).await
    }

    async fn create(&self, contact: NewContact) -> Result<Contact, ContactStoreError> {
        (**self).create(contact).await
    }

    async fn set_precedence(
        &self,
        id: ContactId,
        precedence: LinkPrecedence,
        linked_id: Option<ContactId>,
    ) -> Result<Contact, ContactStoreError> {
        (**self).set_precedence(id, precedence, linked_id).await
    }
}
