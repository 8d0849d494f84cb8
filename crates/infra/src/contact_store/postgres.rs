//! Postgres-backed contact store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | ContactStoreError | Scenario |
//! |------------|----------------------|-------------------|----------|
//! | Database (foreign key violation) | `23503` | `Validation` | `linked_id` points at a missing contact |
//! | Database (check constraint violation) | `23514` | `Validation` | No email and no phone, or inconsistent precedence/link |
//! | Database (other) | Any other | `Storage` | Other database errors |
//! | PoolClosed / Io / Tls / other | N/A | `Storage` | Connection failures |
//!
//! Each statement runs as its own implicit transaction; the resolver does not
//! wrap multi-step sequences.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{FromRow, PgPool, Row};
use tracing::instrument;

use idlink_contacts::{Contact, LinkPrecedence, NewContact};
use idlink_core::ContactId;

use super::r#trait::{ContactStore, ContactStoreError};

const CONTACT_COLUMNS: &str =
    "id, email, phone_number, linked_id, link_precedence, created_at, updated_at";

/// Postgres-backed contact store.
///
/// Uses the SQLx connection pool, which is `Send + Sync` and shared across
/// request tasks.
#[derive(Debug, Clone)]
pub struct PostgresContactStore {
    pool: Arc<PgPool>,
}

impl PostgresContactStore {
    /// Create a store over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Connect to `database_url` and make sure the schema exists.
    pub async fn connect(database_url: &str) -> Result<Self, ContactStoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        let store = Self::new(pool);
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Create the `contacts` table and its indexes if they are missing.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), ContactStoreError> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS contacts (
                id              BIGSERIAL PRIMARY KEY,
                email           TEXT NULL,
                phone_number    TEXT NULL,
                linked_id       BIGINT NULL REFERENCES contacts(id),
                link_precedence TEXT NOT NULL
                    CHECK (link_precedence IN ('primary', 'secondary')),
                created_at      TIMESTAMPTZ NOT NULL,
                updated_at      TIMESTAMPTZ NOT NULL,
                CHECK (email IS NOT NULL OR phone_number IS NOT NULL),
                CHECK ((link_precedence = 'primary') = (linked_id IS NULL))
            )
            "#,
            "CREATE INDEX IF NOT EXISTS contacts_email_idx ON contacts (email)",
            "CREATE INDEX IF NOT EXISTS contacts_phone_number_idx ON contacts (phone_number)",
            "CREATE INDEX IF NOT EXISTS contacts_linked_id_idx ON contacts (linked_id)",
        ];

        for sql in statements {
            sqlx::query(sql)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        Ok(())
    }

    async fn fetch_many(
        &self,
        operation: &str,
        query: sqlx::query::Query<'_, sqlx::Postgres, sqlx::postgres::PgArguments>,
    ) -> Result<Vec<Contact>, ContactStoreError> {
        let rows = query
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        rows.iter().map(decode_contact).collect()
    }

    async fn fetch_one_optional(
        &self,
        operation: &str,
        query: sqlx::query::Query<'_, sqlx::Postgres, sqlx::postgres::PgArguments>,
    ) -> Result<Option<Contact>, ContactStoreError> {
        let row = query
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        row.as_ref().map(decode_contact).transpose()
    }
}

#[async_trait::async_trait]
impl ContactStore for PostgresContactStore {
    #[instrument(skip(self), err)]
    async fn find_by_email_or_phone(
        &self,
        email: Option<&str>,
        phone_number: Option<&str>,
    ) -> Result<Vec<Contact>, ContactStoreError> {
        if email.is_none() && phone_number.is_none() {
            return Ok(vec![]);
        }
        let sql = format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts \
             WHERE ($1::text IS NOT NULL AND email = $1) \
                OR ($2::text IS NOT NULL AND phone_number = $2) \
             ORDER BY created_at ASC, id ASC"
        );
        self.fetch_many(
            "find_by_email_or_phone",
            sqlx::query(&sql).bind(email).bind(phone_number),
        )
        .await
    }

    #[instrument(skip(self), err)]
    async fn find_by_email(&self, email: &str) -> Result<Vec<Contact>, ContactStoreError> {
        let sql = format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts WHERE email = $1 \
             ORDER BY created_at ASC, id ASC"
        );
        self.fetch_many("find_by_email", sqlx::query(&sql).bind(email))
            .await
    }

    #[instrument(skip(self), err)]
    async fn find_by_phone(&self, phone_number: &str) -> Result<Vec<Contact>, ContactStoreError> {
        let sql = format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts WHERE phone_number = $1 \
             ORDER BY created_at ASC, id ASC"
        );
        self.fetch_many("find_by_phone", sqlx::query(&sql).bind(phone_number))
            .await
    }

    #[instrument(skip(self), err)]
    async fn find_primary_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Contact>, ContactStoreError> {
        let sql = format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts \
             WHERE email = $1 AND link_precedence = 'primary' \
             ORDER BY created_at ASC, id ASC LIMIT 1"
        );
        self.fetch_one_optional("find_primary_by_email", sqlx::query(&sql).bind(email))
            .await
    }

    #[instrument(skip(self), err)]
    async fn find_primary_by_phone(
        &self,
        phone_number: &str,
    ) -> Result<Option<Contact>, ContactStoreError> {
        let sql = format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts \
             WHERE phone_number = $1 AND link_precedence = 'primary' \
             ORDER BY created_at ASC, id ASC LIMIT 1"
        );
        self.fetch_one_optional("find_primary_by_phone", sqlx::query(&sql).bind(phone_number))
            .await
    }

    #[instrument(skip(self), fields(id = %id), err)]
    async fn find_by_id(&self, id: ContactId) -> Result<Option<Contact>, ContactStoreError> {
        let sql = format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = $1");
        self.fetch_one_optional("find_by_id", sqlx::query(&sql).bind(id.get()))
            .await
    }

    #[instrument(skip(self), fields(id = %id), err)]
    async fn find_linked_to(&self, id: ContactId) -> Result<Vec<Contact>, ContactStoreError> {
        let sql = format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts WHERE linked_id = $1 \
             ORDER BY created_at ASC, id ASC"
        );
        self.fetch_many("find_linked_to", sqlx::query(&sql).bind(id.get()))
            .await
    }

    #[instrument(skip(self), fields(root = %root), err)]
    async fn find_cluster(&self, root: ContactId) -> Result<Vec<Contact>, ContactStoreError> {
        // UNION (not UNION ALL) drops repeated rows, so a link cycle terminates.
        let sql = format!(
            "WITH RECURSIVE cluster AS ( \
                 SELECT {CONTACT_COLUMNS} FROM contacts WHERE linked_id = $1 \
                 UNION \
                 SELECT c.id, c.email, c.phone_number, c.linked_id, c.link_precedence, \
                        c.created_at, c.updated_at \
                 FROM contacts c JOIN cluster ON c.linked_id = cluster.id \
             ) \
             SELECT {CONTACT_COLUMNS} FROM cluster WHERE id <> $1 \
             ORDER BY created_at ASC, id ASC"
        );
        self.fetch_many("find_cluster", sqlx::query(&sql).bind(root.get()))
            .await
    }

    #[instrument(skip(self, contact), fields(precedence = %contact.link_precedence), err)]
    async fn create(&self, contact: NewContact) -> Result<Contact, ContactStoreError> {
        contact.validate()?;
        let sql = format!(
            "INSERT INTO contacts \
                (email, phone_number, linked_id, link_precedence, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, NOW(), NOW()) \
             RETURNING {CONTACT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(contact.email.as_deref())
            .bind(contact.phone_number.as_deref())
            .bind(contact.linked_id.map(ContactId::get))
            .bind(contact.link_precedence.as_str())
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("create", e))?;
        decode_contact(&row)
    }

    #[instrument(skip(self), fields(id = %id, precedence = %precedence), err)]
    async fn set_precedence(
        &self,
        id: ContactId,
        precedence: LinkPrecedence,
        linked_id: Option<ContactId>,
    ) -> Result<Contact, ContactStoreError> {
        let sql = format!(
            "UPDATE contacts \
             SET link_precedence = $2, linked_id = $3, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {CONTACT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id.get())
            .bind(precedence.as_str())
            .bind(linked_id.map(ContactId::get))
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("set_precedence", e))?;
        match row {
            Some(row) => decode_contact(&row),
            None => Err(ContactStoreError::NotFound(id)),
        }
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> ContactStoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                // Foreign key violation: linked contact missing.
                Some("23503") => ContactStoreError::Validation(msg),
                // Check constraint violation.
                Some("23514") => ContactStoreError::Validation(msg),
                _ => ContactStoreError::Storage(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            ContactStoreError::Storage(format!("connection pool closed in {}", operation))
        }
        other => ContactStoreError::Storage(format!("{} failed: {}", operation, other)),
    }
}

#[derive(Debug)]
struct ContactRow {
    id: i64,
    email: Option<String>,
    phone_number: Option<String>,
    linked_id: Option<i64>,
    link_precedence: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for ContactRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(ContactRow {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            phone_number: row.try_get("phone_number")?,
            linked_id: row.try_get("linked_id")?,
            link_precedence: row.try_get("link_precedence")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl TryFrom<ContactRow> for Contact {
    type Error = ContactStoreError;

    fn try_from(row: ContactRow) -> Result<Self, Self::Error> {
        let link_precedence: LinkPrecedence = row.link_precedence.parse().map_err(|e| {
            ContactStoreError::Storage(format!("contact {} has bad precedence: {e}", row.id))
        })?;
        let contact = Contact {
            id: ContactId::new(row.id),
            email: row.email,
            phone_number: row.phone_number,
            linked_id: row.linked_id.map(ContactId::new),
            link_precedence,
            created_at: row.created_at,
            updated_at: row.updated_at,
        };
        contact
            .validate()
            .map_err(|e| ContactStoreError::Storage(format!("corrupt contact row: {e}")))?;
        Ok(contact)
    }
}

fn decode_contact(row: &PgRow) -> Result<Contact, ContactStoreError> {
    let raw = ContactRow::from_row(row)
        .map_err(|e| ContactStoreError::Storage(format!("failed to decode contact row: {e}")))?;
    Contact::try_from(raw)
}
