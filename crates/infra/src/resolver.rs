//! Identity resolution pipeline (application-level orchestration).
//!
//! ```text
//! IdentifyRequest
//!   ↓
//! 1. Classify by present identifiers (email only / phone only / both)
//!   ↓
//! 2. Look up existing contacts per identifier (oldest first)
//!   ↓
//! 3. Decide: create primary | attach secondary | merge clusters | nothing
//!   ↓
//! 4. Re-read the cluster and build the `ClusterView`
//! ```
//!
//! The resolver keeps no state between requests and wraps nothing in a
//! transaction: every step is a separate store call, and the first failure
//! aborts the request. Concurrent requests on overlapping values can race.

use std::str::FromStr;

use thiserror::Error;
use tracing::{error, info, instrument, warn};

use idlink_contacts::{ClusterView, Contact, IdentifyRequest, Identifiers, LinkPrecedence, NewContact};
use idlink_core::{ContactId, DomainError};

use crate::contact_store::{ContactStore, ContactStoreError};

/// Upper bound on `linked_id` hops when walking up to a primary.
const MAX_LINK_DEPTH: usize = 64;

/// How two clusters are joined when one request matches both.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Demote the later primary and re-point its secondaries at the survivor,
    /// so every secondary links directly to its primary.
    #[default]
    Reparent,
    /// Flip only the later of the two matched contacts; its existing
    /// secondaries keep pointing at it (two-level chain).
    FlipOnly,
}

impl MergeStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeStrategy::Reparent => "reparent",
            MergeStrategy::FlipOnly => "flip_only",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown merge strategy '{0}' (expected reparent or flip_only)")]
pub struct UnknownMergeStrategy(pub String);

impl FromStr for MergeStrategy {
    type Err = UnknownMergeStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "reparent" => Ok(MergeStrategy::Reparent),
            "flip_only" => Ok(MergeStrategy::FlipOnly),
            other => Err(UnknownMergeStrategy(other.to_string())),
        }
    }
}

/// Resolution failure.
///
/// Callers report all of these as a single opaque "resolution failed"
/// outcome; the variant is for logs and for the HTTP status split.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// Neither identifier supplied (normally rejected by the host first).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// A store call failed.
    #[error("contact store unavailable: {0}")]
    StoreUnavailable(String),
    /// The store disagrees with what the resolver just read or wrote.
    #[error("integrity violation: {0}")]
    IntegrityViolation(String),
}

impl ResolveError {
    pub fn kind(&self) -> &'static str {
        match self {
            ResolveError::InvalidRequest(_) => "invalid_request",
            ResolveError::StoreUnavailable(_) => "store_unavailable",
            ResolveError::IntegrityViolation(_) => "integrity_violation",
        }
    }

    fn integrity(msg: impl Into<String>) -> Self {
        ResolveError::IntegrityViolation(msg.into())
    }
}

impl From<ContactStoreError> for ResolveError {
    fn from(err: ContactStoreError) -> Self {
        match err {
            // The resolver only writes rows it has already checked, so a
            // rejected write means the store changed underneath it.
            ContactStoreError::Validation(msg) => {
                ResolveError::integrity(format!("store rejected write: {msg}"))
            }
            ContactStoreError::NotFound(id) => {
                ResolveError::integrity(format!("contact {id} disappeared from the store"))
            }
            ContactStoreError::Storage(msg) => ResolveError::StoreUnavailable(msg),
        }
    }
}

impl From<DomainError> for ResolveError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) => ResolveError::InvalidRequest(msg),
            DomainError::InvariantViolation(msg) => ResolveError::IntegrityViolation(msg),
        }
    }
}

/// One identifier value, tagged with which column it lives in.
#[derive(Debug, Clone, Copy)]
enum Lookup<'a> {
    Email(&'a str),
    Phone(&'a str),
}

impl<'a> Lookup<'a> {
    /// The value this lookup carries, as (email, phone) columns.
    fn columns(self) -> (Option<&'a str>, Option<&'a str>) {
        match self {
            Lookup::Email(v) => (Some(v), None),
            Lookup::Phone(v) => (None, Some(v)),
        }
    }
}

/// Identity resolver over an injected contact store.
#[derive(Debug)]
pub struct IdentityResolver<S> {
    store: S,
    merge_strategy: MergeStrategy,
}

impl<S> IdentityResolver<S>
where
    S: ContactStore,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            merge_strategy: MergeStrategy::default(),
        }
    }

    pub fn with_merge_strategy(mut self, merge_strategy: MergeStrategy) -> Self {
        self.merge_strategy = merge_strategy;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn merge_strategy(&self) -> MergeStrategy {
        self.merge_strategy
    }

    /// Map a request onto its identity cluster, creating or relinking
    /// contacts as needed.
    #[instrument(
        skip(self, request),
        fields(
            has_email = request.email.is_some(),
            has_phone = request.phone_number.is_some(),
            strategy = self.merge_strategy.as_str()
        )
    )]
    pub async fn resolve(&self, request: &IdentifyRequest) -> Result<ClusterView, ResolveError> {
        let result = match request.identifiers() {
            Ok(Identifiers::EmailOnly(email)) => self.resolve_single(Lookup::Email(&email)).await,
            Ok(Identifiers::PhoneOnly(phone)) => self.resolve_single(Lookup::Phone(&phone)).await,
            Ok(Identifiers::Both {
                email,
                phone_number,
            }) => self.reconcile(&email, &phone_number).await,
            Err(e) => Err(e.into()),
        };

        match &result {
            Ok(view) => info!(
                primary_contact_id = %view.primary_contact_id,
                secondaries = view.secondary_contact_ids.len(),
                "identity resolved"
            ),
            Err(e @ ResolveError::IntegrityViolation(_)) => {
                error!(kind = e.kind(), "resolution failed: {e}")
            }
            Err(e) => warn!(kind = e.kind(), "resolution failed: {e}"),
        }
        result
    }

    /// Only one identifier supplied.
    ///
    /// Unknown value: new primary. Known value: borrow the oldest match's
    /// counterpart (if any) and reconcile the pair, so the caller sees the
    /// existing cluster instead of getting a duplicate.
    async fn resolve_single(&self, lookup: Lookup<'_>) -> Result<ClusterView, ResolveError> {
        let matches = match lookup {
            Lookup::Email(email) => self.store.find_by_email(email).await?,
            Lookup::Phone(phone) => self.store.find_by_phone(phone).await?,
        };

        let Some(oldest) = matches.first() else {
            let (email, phone) = lookup.columns();
            let created = self
                .store
                .create(NewContact::primary(
                    email.map(str::to_string),
                    phone.map(str::to_string),
                )?)
                .await?;
            info!(contact_id = %created.id, "created primary contact");
            return Ok(ClusterView::single(&created));
        };

        match lookup {
            Lookup::Email(email) => match oldest.phone_number.as_deref() {
                Some(phone) => self.reconcile(email, phone).await,
                None => self.cluster_view(Some(email), None).await,
            },
            Lookup::Phone(phone) => match oldest.email.as_deref() {
                Some(email) => self.reconcile(email, phone).await,
                None => self.cluster_view(None, Some(phone)).await,
            },
        }
    }

    /// Both identifiers supplied.
    async fn reconcile(&self, email: &str, phone: &str) -> Result<ClusterView, ResolveError> {
        let by_email = self.store.find_by_email(email).await?;
        let by_phone = self.store.find_by_phone(phone).await?;

        match (by_email.first(), by_phone.first()) {
            (Some(e), Some(p)) => {
                if e.id != p.id {
                    self.merge(e, p).await?;
                }
            }
            (Some(e), None) => self.attach(Lookup::Email(email), e, email, phone).await?,
            (None, Some(p)) => self.attach(Lookup::Phone(phone), p, email, phone).await?,
            (None, None) => {
                let created = self
                    .store
                    .create(NewContact::primary(
                        Some(email.to_string()),
                        Some(phone.to_string()),
                    )?)
                    .await?;
                info!(contact_id = %created.id, "created primary contact");
                return Ok(ClusterView::single(&created));
            }
        }

        self.cluster_view(Some(email), Some(phone)).await
    }

    /// One value is known, the other is new: add a secondary carrying both
    /// to the known value's cluster.
    async fn attach(
        &self,
        known: Lookup<'_>,
        oldest_match: &Contact,
        email: &str,
        phone: &str,
    ) -> Result<(), ResolveError> {
        let primary = self.primary_for(known, oldest_match).await?;
        let created = self
            .store
            .create(NewContact::secondary(
                Some(email.to_string()),
                Some(phone.to_string()),
                primary.id,
            )?)
            .await?;
        info!(
            contact_id = %created.id,
            primary_contact_id = %primary.id,
            "created secondary contact"
        );
        Ok(())
    }

    /// The request matched two different contacts: join their clusters so
    /// the older contact wins.
    async fn merge(&self, a: &Contact, b: &Contact) -> Result<(), ResolveError> {
        match self.merge_strategy {
            MergeStrategy::FlipOnly => {
                let (older, newer) = if a.is_older_than(b) { (a, b) } else { (b, a) };
                self.store
                    .set_precedence(newer.id, LinkPrecedence::Secondary, Some(older.id))
                    .await?;
                info!(
                    demoted_contact_id = %newer.id,
                    primary_contact_id = %older.id,
                    "merged clusters (flip only)"
                );
            }
            MergeStrategy::Reparent => {
                let root_a = self.root_of(a).await?;
                let root_b = self.root_of(b).await?;
                if root_a.id == root_b.id {
                    return Ok(());
                }
                let (survivor, demoted) = if root_a.is_older_than(&root_b) {
                    (root_a, root_b)
                } else {
                    (root_b, root_a)
                };

                self.store
                    .set_precedence(demoted.id, LinkPrecedence::Secondary, Some(survivor.id))
                    .await?;

                let orphans = self.store.find_linked_to(demoted.id).await?;
                for orphan in &orphans {
                    self.store
                        .set_precedence(orphan.id, LinkPrecedence::Secondary, Some(survivor.id))
                        .await?;
                }
                info!(
                    demoted_contact_id = %demoted.id,
                    primary_contact_id = %survivor.id,
                    reparented = orphans.len(),
                    "merged clusters"
                );
            }
        }
        Ok(())
    }

    /// Primary of the cluster a known value belongs to.
    ///
    /// Asks the store for a primary carrying the value first; if the value
    /// only appears on secondaries, walks up from the oldest match.
    async fn primary_for(
        &self,
        known: Lookup<'_>,
        oldest_match: &Contact,
    ) -> Result<Contact, ResolveError> {
        let direct = match known {
            Lookup::Email(email) => self.store.find_primary_by_email(email).await?,
            Lookup::Phone(phone) => self.store.find_primary_by_phone(phone).await?,
        };
        match direct {
            Some(primary) => Ok(primary),
            None => self.root_of(oldest_match).await,
        }
    }

    /// Follow `linked_id` up to the cluster's primary.
    async fn root_of(&self, contact: &Contact) -> Result<Contact, ResolveError> {
        let mut current = contact.clone();
        for _ in 0..MAX_LINK_DEPTH {
            if current.is_primary() {
                return Ok(current);
            }
            let child = current.id;
            let parent = current.linked_id.ok_or_else(|| {
                ResolveError::integrity(format!("secondary contact {child} has no linked id"))
            })?;
            current = self.store.find_by_id(parent).await?.ok_or_else(|| {
                ResolveError::integrity(format!(
                    "contact {child} links to missing contact {parent}"
                ))
            })?;
        }
        Err(ResolveError::integrity(format!(
            "no primary within {MAX_LINK_DEPTH} links of contact {}",
            contact.id
        )))
    }

    /// Build the view for the cluster the given values belong to.
    ///
    /// The email-OR-phone rows seed the lookup; the oldest seed is walked up
    /// to its primary and the full cluster is read from there, so members
    /// sharing neither value are still included.
    async fn cluster_view(
        &self,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<ClusterView, ResolveError> {
        let seed = self.store.find_by_email_or_phone(email, phone).await?;
        let Some(oldest) = seed.first() else {
            return Err(ResolveError::integrity(format!(
                "no contacts found for email={email:?} phone={phone:?}"
            )));
        };

        let primary = self.root_of(oldest).await?;
        let members = self.store.find_cluster(primary.id).await?;
        Ok(ClusterView::assemble(&primary, &members))
    }
}
