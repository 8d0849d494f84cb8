//! Consolidated view of an identity cluster.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use idlink_core::ContactId;

use crate::contact::Contact;

/// What the identify operation returns: the primary, every distinct email and
/// phone number in the cluster, and the ids of all secondaries.
///
/// `emails` and `phone_numbers` keep first-seen order over the members
/// (primary first, then oldest to newest), so the primary's values lead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterView {
    pub primary_contact_id: ContactId,
    pub emails: Vec<String>,
    pub phone_numbers: Vec<String>,
    pub secondary_contact_ids: Vec<ContactId>,
}

impl ClusterView {
    /// View of a cluster with a single (just created) member.
    pub fn single(contact: &Contact) -> Self {
        Self::build(contact, std::iter::empty())
    }

    /// Build a view from a known primary and the members collected for it.
    ///
    /// `members` may be unordered, may repeat rows and may include the primary
    /// itself. The primary always comes first; the rest are ordered by
    /// `(created_at, id)`.
    pub fn assemble(primary: &Contact, members: &[Contact]) -> Self {
        let mut seen = HashSet::from([primary.id]);
        let mut rest: Vec<&Contact> = members.iter().filter(|c| seen.insert(c.id)).collect();
        rest.sort_by_key(|c| c.ordering_key());
        Self::build(primary, rest.into_iter())
    }

    /// All ids in the cluster, primary first.
    pub fn contact_ids(&self) -> impl Iterator<Item = ContactId> + '_ {
        std::iter::once(self.primary_contact_id).chain(self.secondary_contact_ids.iter().copied())
    }

    fn build<'a>(primary: &'a Contact, rest: impl Iterator<Item = &'a Contact>) -> Self {
        let mut emails = Vec::new();
        let mut phone_numbers = Vec::new();
        let mut seen_emails = HashSet::new();
        let mut seen_phones = HashSet::new();

        let mut collect = |c: &'a Contact| {
            if let Some(email) = c.email.as_deref() {
                if seen_emails.insert(email) {
                    emails.push(email.to_string());
                }
            }
            if let Some(phone) = c.phone_number.as_deref() {
                if seen_phones.insert(phone) {
                    phone_numbers.push(phone.to_string());
                }
            }
        };

        collect(primary);

        let mut secondary_contact_ids = Vec::new();
        for c in rest {
            if c.id != primary.id {
                secondary_contact_ids.push(c.id);
            }
            collect(c);
        }

        Self {
            primary_contact_id: primary.id,
            emails,
            phone_numbers,
            secondary_contact_ids,
        }
    }
}
