use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use idlink_core::{ContactId, DomainError, DomainResult};

/// Position of a contact inside its identity cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkPrecedence {
    Primary,
    Secondary,
}

impl LinkPrecedence {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkPrecedence::Primary => "primary",
            LinkPrecedence::Secondary => "secondary",
        }
    }
}

impl core::fmt::Display for LinkPrecedence {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinkPrecedence {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "primary" => Ok(LinkPrecedence::Primary),
            "secondary" => Ok(LinkPrecedence::Secondary),
            other => Err(DomainError::validation(format!(
                "unknown link precedence '{other}'"
            ))),
        }
    }
}

/// A stored contact record.
///
/// A contact is created once and never deleted. The only mutation it ever
/// sees is the link update performed when two clusters merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: ContactId,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub linked_id: Option<ContactId>,
    pub link_precedence: LinkPrecedence,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Contact {
    pub fn is_primary(&self) -> bool {
        self.link_precedence == LinkPrecedence::Primary
    }

    /// Key every contact listing is ordered by: creation time, then id.
    pub fn ordering_key(&self) -> (DateTime<Utc>, ContactId) {
        (self.created_at, self.id)
    }

    /// Whether this contact was created before `other`.
    pub fn is_older_than(&self, other: &Contact) -> bool {
        self.ordering_key() < other.ordering_key()
    }

    /// Check the per-record invariants.
    ///
    /// - at least one of email / phone number is present
    /// - `linked_id` is set iff the contact is secondary, and never points at itself
    pub fn validate(&self) -> DomainResult<()> {
        if self.email.is_none() && self.phone_number.is_none() {
            return Err(DomainError::invariant(format!(
                "contact {} has neither email nor phone number",
                self.id
            )));
        }
        match (self.link_precedence, self.linked_id) {
            (LinkPrecedence::Primary, None) => Ok(()),
            (LinkPrecedence::Primary, Some(_)) => Err(DomainError::invariant(format!(
                "primary contact {} must not carry a linked id",
                self.id
            ))),
            (LinkPrecedence::Secondary, None) => Err(DomainError::invariant(format!(
                "secondary contact {} has no linked id",
                self.id
            ))),
            (LinkPrecedence::Secondary, Some(linked)) if linked == self.id => Err(
                DomainError::invariant(format!("contact {} links to itself", self.id)),
            ),
            (LinkPrecedence::Secondary, Some(_)) => Ok(()),
        }
    }
}

/// Sort contacts oldest first.
pub fn sort_oldest_first(contacts: &mut [Contact]) {
    contacts.sort_by_key(Contact::ordering_key);
}

/// A contact that has not been stored yet (the store assigns id and timestamps).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewContact {
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub linked_id: Option<ContactId>,
    pub link_precedence: LinkPrecedence,
}

impl NewContact {
    /// A new cluster root.
    pub fn primary(email: Option<String>, phone_number: Option<String>) -> DomainResult<Self> {
        let new = Self {
            email,
            phone_number,
            linked_id: None,
            link_precedence: LinkPrecedence::Primary,
        };
        new.validate()?;
        Ok(new)
    }

    /// A new alias attached to an existing primary.
    pub fn secondary(
        email: Option<String>,
        phone_number: Option<String>,
        primary_id: ContactId,
    ) -> DomainResult<Self> {
        let new = Self {
            email,
            phone_number,
            linked_id: Some(primary_id),
            link_precedence: LinkPrecedence::Secondary,
        };
        new.validate()?;
        Ok(new)
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.email.is_none() && self.phone_number.is_none() {
            return Err(DomainError::validation(
                "a contact needs an email or a phone number",
            ));
        }
        match (self.link_precedence, self.linked_id) {
            (LinkPrecedence::Primary, Some(_)) => Err(DomainError::invariant(
                "primary contact must not carry a linked id",
            )),
            (LinkPrecedence::Secondary, None) => {
                Err(DomainError::invariant("secondary contact needs a linked id"))
            }
            _ => Ok(()),
        }
    }

    /// Materialize into a stored contact (used by stores once an id is assigned).
    pub fn into_contact(self, id: ContactId, now: DateTime<Utc>) -> Contact {
        Contact {
            id,
            email: self.email,
            phone_number: self.phone_number,
            linked_id: self.linked_id,
            link_precedence: self.link_precedence,
            created_at: now,
            updated_at: now,
        }
    }
}
