use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use idlink_contacts::contact::sort_oldest_first;
use idlink_contacts::{Contact, LinkPrecedence, NewContact};
use idlink_core::ContactId;

use super::r#trait::{ContactStore, ContactStoreError};

#[derive(Debug, Default)]
struct Inner {
    last_id: i64,
    last_created_at: Option<DateTime<Utc>>,
    rows: BTreeMap<ContactId, Contact>,
}

impl Inner {
    fn select(&self, pred: impl Fn(&Contact) -> bool) -> Vec<Contact> {
        let mut out: Vec<Contact> = self.rows.values().filter(|&c| pred(c)).cloned().collect();
        sort_oldest_first(&mut out);
        out
    }

    /// Creation timestamps never go backwards, so id order and
    /// `created_at` order agree even if the wall clock steps back.
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let ts = match self.last_created_at {
            Some(last) if last > now => last,
            _ => now,
        };
        self.last_created_at = Some(ts);
        ts
    }
}

/// In-memory contact store.
///
/// Intended for tests/dev. Each operation takes the lock once; nothing spans
/// operations, which matches the guarantees of the Postgres store.
#[derive(Debug, Default)]
pub struct InMemoryContactStore {
    inner: RwLock<Inner>,
}

impl InMemoryContactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully specified row (explicit id and timestamps).
    ///
    /// Test/dev helper for arranging existing data. Later `create` calls
    /// continue numbering after the highest seeded id.
    pub fn seed(&self, contact: Contact) -> Result<(), ContactStoreError> {
        self.write(|inner| {
            inner.last_id = inner.last_id.max(contact.id.get());
            inner.last_created_at = inner.last_created_at.max(Some(contact.created_at));
            inner.rows.insert(contact.id, contact);
            Ok(())
        })
    }

    /// All rows, oldest first.
    pub fn snapshot(&self) -> Vec<Contact> {
        match self.inner.read() {
            Ok(inner) => inner.select(|_| true),
            Err(_) => vec![],
        }
    }

    fn read<T>(&self, f: impl FnOnce(&Inner) -> T) -> Result<T, ContactStoreError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| ContactStoreError::Storage("lock poisoned".to_string()))?;
        Ok(f(&inner))
    }

    fn write<T>(
        &self,
        f: impl FnOnce(&mut Inner) -> Result<T, ContactStoreError>,
    ) -> Result<T, ContactStoreError> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| ContactStoreError::Storage("lock poisoned".to_string()))?;
        f(&mut inner)
    }
}

#[async_trait::async_trait]
impl ContactStore for InMemoryContactStore {
    async fn find_by_email_or_phone(
        &self,
        email: Option<&str>,
        phone_number: Option<&str>,
    ) -> Result<Vec<Contact>, ContactStoreError> {
        if email.is_none() && phone_number.is_none() {
            return Ok(vec![]);
        }
        self.read(|inner| {
            inner.select(|c| {
                (email.is_some() && c.email.as_deref() == email)
                    || (phone_number.is_some() && c.phone_number.as_deref() == phone_number)
            })
        })
    }

    async fn find_by_email(&self, email: &str) -> Result<Vec<Contact>, ContactStoreError> {
        self.read(|inner| inner.select(|c| c.email.as_deref() == Some(email)))
    }

    async fn find_by_phone(&self, phone_number: &str) -> Result<Vec<Contact>, ContactStoreError> {
        self.read(|inner| inner.select(|c| c.phone_number.as_deref() == Some(phone_number)))
    }

    async fn find_primary_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Contact>, ContactStoreError> {
        self.read(|inner| {
            inner
                .select(|c| c.is_primary() && c.email.as_deref() == Some(email))
                .into_iter()
                .next()
        })
    }

    async fn find_primary_by_phone(
        &self,
        phone_number: &str,
    ) -> Result<Option<Contact>, ContactStoreError> {
        self.read(|inner| {
            inner
                .select(|c| c.is_primary() && c.phone_number.as_deref() == Some(phone_number))
                .into_iter()
                .next()
        })
    }

    async fn find_by_id(&self, id: ContactId) -> Result<Option<Contact>, ContactStoreError> {
        self.read(|inner| inner.rows.get(&id).cloned())
    }

    async fn find_linked_to(&self, id: ContactId) -> Result<Vec<Contact>, ContactStoreError> {
        self.read(|inner| inner.select(|c| c.linked_id == Some(id)))
    }

    async fn find_cluster(&self, root: ContactId) -> Result<Vec<Contact>, ContactStoreError> {
        self.read(|inner| {
            let mut children: HashMap<ContactId, Vec<&Contact>> = HashMap::new();
            for c in inner.rows.values() {
                if let Some(parent) = c.linked_id {
                    children.entry(parent).or_default().push(c);
                }
            }

            let mut visited: HashSet<ContactId> = HashSet::from([root]);
            let mut frontier = vec![root];
            let mut out = Vec::new();
            while let Some(id) = frontier.pop() {
                for &c in children.get(&id).into_iter().flatten() {
                    if visited.insert(c.id) {
                        frontier.push(c.id);
                        out.push(c.clone());
                    }
                }
            }
            sort_oldest_first(&mut out);
            out
        })
    }

    async fn create(&self, contact: NewContact) -> Result<Contact, ContactStoreError> {
        contact.validate()?;
        self.write(|inner| {
            if let Some(linked) = contact.linked_id {
                if !inner.rows.contains_key(&linked) {
                    return Err(ContactStoreError::Validation(format!(
                        "linked contact {linked} does not exist"
                    )));
                }
            }
            inner.last_id += 1;
            let id = ContactId::new(inner.last_id);
            let now = inner.next_timestamp();
            let stored = contact.into_contact(id, now);
            inner.rows.insert(id, stored.clone());
            Ok(stored)
        })
    }

    async fn set_precedence(
        &self,
        id: ContactId,
        precedence: LinkPrecedence,
        linked_id: Option<ContactId>,
    ) -> Result<Contact, ContactStoreError> {
        self.write(|inner| {
            if let Some(linked) = linked_id {
                if linked == id || !inner.rows.contains_key(&linked) {
                    return Err(ContactStoreError::Validation(format!(
                        "contact {id} cannot link to {linked}"
                    )));
                }
            }
            let now = Utc::now();
            let row = inner
                .rows
                .get_mut(&id)
                .ok_or(ContactStoreError::NotFound(id))?;
            row.link_precedence = precedence;
            row.linked_id = linked_id;
            row.updated_at = now.max(row.created_at);
            Ok(row.clone())
        })
    }
}
