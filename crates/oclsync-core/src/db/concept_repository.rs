//! Local concept store

use crate::error::{Error, Result};
use crate::models::{ConceptName, ImportedConcept};
use crate::util::unix_millis_now;
use libsql::Connection;

/// Trait for local concept storage operations
#[allow(async_fn_in_trait)]
pub trait ConceptRepository {
    /// Insert or replace a concept together with all of its names
    async fn save(&self, concept: &ImportedConcept) -> Result<()>;

    /// Get a concept by UUID
    async fn get(&self, uuid: &str) -> Result<Option<ImportedConcept>>;

    /// Owner of an identity-bearing name with exactly this text and locale,
    /// ignoring names of `excluding_uuid`
    async fn find_identity_owner(
        &self,
        name: &str,
        locale: &str,
        excluding_uuid: &str,
    ) -> Result<Option<String>>;

    /// Number of stored concepts
    async fn count(&self) -> Result<usize>;
}

/// libSQL implementation of `ConceptRepository`
pub struct LibSqlConceptRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlConceptRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    async fn write_concept(&self, concept: &ImportedConcept) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO concepts (uuid, retired, updated_at) VALUES (?, ?, ?)
                 ON CONFLICT(uuid) DO UPDATE SET
                     retired = excluded.retired,
                     updated_at = excluded.updated_at",
                libsql::params![
                    concept.uuid.as_str(),
                    i32::from(concept.retired),
                    unix_millis_now()
                ],
            )
            .await?;

        self.conn
            .execute(
                "DELETE FROM concept_names WHERE concept_uuid = ?",
                [concept.uuid.as_str()],
            )
            .await?;

        for name in &concept.names {
            self.conn
                .execute(
                    "INSERT INTO concept_names
                         (concept_uuid, name, locale, name_type, locale_preferred)
                     VALUES (?, ?, ?, ?, ?)",
                    libsql::params![
                        concept.uuid.as_str(),
                        name.name.as_str(),
                        name.locale.as_str(),
                        name.name_type.as_str(),
                        i32::from(name.locale_preferred)
                    ],
                )
                .await?;
        }

        Ok(())
    }

    fn parse_name(row: &libsql::Row) -> Result<ConceptName> {
        let name_type: String = row.get(2)?;
        Ok(ConceptName {
            name: row.get(0)?,
            locale: row.get(1)?,
            name_type: name_type.parse().map_err(Error::Database)?,
            locale_preferred: row.get::<i32>(3)? != 0,
        })
    }
}

impl ConceptRepository for LibSqlConceptRepository<'_> {
    async fn save(&self, concept: &ImportedConcept) -> Result<()> {
        self.conn.execute("BEGIN IMMEDIATE TRANSACTION", ()).await?;

        if let Err(e) = self.write_concept(concept).await {
            self.conn.execute("ROLLBACK", ()).await.ok();
            return Err(e);
        }

        if let Err(e) = self.conn.execute("COMMIT", ()).await {
            self.conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }

        Ok(())
    }

    async fn get(&self, uuid: &str) -> Result<Option<ImportedConcept>> {
        let mut rows = self
            .conn
            .query("SELECT retired FROM concepts WHERE uuid = ?", [uuid])
            .await?;
        let Some(row) = rows.next().await? else {
            return Ok(None);
        };
        let retired = row.get::<i32>(0)? != 0;

        let mut rows = self
            .conn
            .query(
                "SELECT name, locale, name_type, locale_preferred
                 FROM concept_names
                 WHERE concept_uuid = ?
                 ORDER BY id",
                [uuid],
            )
            .await?;

        let mut names = Vec::new();
        while let Some(row) = rows.next().await? {
            names.push(Self::parse_name(&row)?);
        }

        Ok(Some(ImportedConcept {
            uuid: uuid.to_string(),
            names,
            retired,
        }))
    }

    async fn find_identity_owner(
        &self,
        name: &str,
        locale: &str,
        excluding_uuid: &str,
    ) -> Result<Option<String>> {
        // `=` uses BINARY collation, so the match is exact and case-sensitive
        let mut rows = self
            .conn
            .query(
                "SELECT concept_uuid FROM concept_names
                 WHERE name = ? AND locale = ?
                   AND (name_type = 'FULLY_SPECIFIED' OR locale_preferred = 1)
                   AND concept_uuid != ?
                 LIMIT 1",
                [name, locale, excluding_uuid],
            )
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(row.get(0)?))
        } else {
            Ok(None)
        }
    }

    async fn count(&self) -> Result<usize> {
        let mut rows = self.conn.query("SELECT COUNT(*) FROM concepts", ()).await?;
        let count: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => 0,
        };
        usize::try_from(count).map_err(|e| Error::Database(e.to_string()))
    }
}
