use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgConnection, PgPool, Postgres, Row, postgres::PgRow};

use crate::{
    Document, DocumentKey, Result, StoreError, StoredDocument, Version,
    store::{DocumentStore, StoreTransaction, WriteOptions},
};

/// PostgreSQL-backed document store.
///
/// Documents live in a single `documents` table keyed by
/// `(collection, key)`. The primary key doubles as the uniqueness
/// constraint behind [`WriteOptions::expect_new`].
#[derive(Clone)]
pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    /// Creates a new PostgreSQL document store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_document(row: PgRow) -> Result<StoredDocument> {
        let metadata_json: serde_json::Value = row.try_get("metadata")?;
        let metadata: HashMap<String, serde_json::Value> = serde_json::from_value(metadata_json)?;

        Ok(StoredDocument {
            key: DocumentKey::new(
                row.try_get::<String, _>("collection")?,
                row.try_get::<String, _>("key")?,
            ),
            version: Version::new(row.try_get("version")?),
            written_at: row.try_get("written_at")?,
            payload: row.try_get("payload")?,
            metadata,
        })
    }
}

async fn current_version(conn: &mut PgConnection, key: &DocumentKey) -> Result<Version> {
    let version: Option<i64> =
        sqlx::query_scalar("SELECT version FROM documents WHERE collection = $1 AND key = $2")
            .bind(&key.collection)
            .bind(&key.key)
            .fetch_optional(&mut *conn)
            .await?;
    Ok(Version::new(version.unwrap_or(0)))
}

/// Writes one document on the given connection, honouring the precondition.
async fn write_document(
    conn: &mut PgConnection,
    document: Document,
    options: WriteOptions,
) -> Result<Version> {
    let metadata_json = serde_json::to_value(&document.metadata)?;
    let key = document.key;
    let now = Utc::now();

    let written: Option<i64> = match options.expected_version {
        Some(expected) if expected == Version::initial() => {
            sqlx::query_scalar(
                r#"
                INSERT INTO documents (collection, key, version, written_at, payload, metadata)
                VALUES ($1, $2, 1, $3, $4, $5)
                ON CONFLICT (collection, key) DO NOTHING
                RETURNING version
                "#,
            )
            .bind(&key.collection)
            .bind(&key.key)
            .bind(now)
            .bind(&document.payload)
            .bind(&metadata_json)
            .fetch_optional(&mut *conn)
            .await?
        }
        Some(expected) => {
            sqlx::query_scalar(
                r#"
                UPDATE documents
                SET version = version + 1, written_at = $3, payload = $4, metadata = $5
                WHERE collection = $1 AND key = $2 AND version = $6
                RETURNING version
                "#,
            )
            .bind(&key.collection)
            .bind(&key.key)
            .bind(now)
            .bind(&document.payload)
            .bind(&metadata_json)
            .bind(expected.as_i64())
            .fetch_optional(&mut *conn)
            .await?
        }
        None => {
            sqlx::query_scalar(
                r#"
                INSERT INTO documents (collection, key, version, written_at, payload, metadata)
                VALUES ($1, $2, 1, $3, $4, $5)
                ON CONFLICT (collection, key) DO UPDATE
                SET version = documents.version + 1,
                    written_at = EXCLUDED.written_at,
                    payload = EXCLUDED.payload,
                    metadata = EXCLUDED.metadata
                RETURNING version
                "#,
            )
            .bind(&key.collection)
            .bind(&key.key)
            .bind(now)
            .bind(&document.payload)
            .bind(&metadata_json)
            .fetch_optional(&mut *conn)
            .await?
        }
    };

    match written {
        Some(version) => Ok(Version::new(version)),
        None => {
            let actual = current_version(conn, &key).await?;
            Err(StoreError::Conflict {
                expected: options.expected_version.unwrap_or(Version::initial()),
                key,
                actual,
            })
        }
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresTransaction { tx }))
    }

    async fn put(&self, document: Document, options: WriteOptions) -> Result<Version> {
        let mut conn = self.pool.acquire().await?;
        write_document(&mut conn, document, options).await
    }

    async fn get(&self, collection: &str, key: &str) -> Result<Option<StoredDocument>> {
        let row = sqlx::query(
            r#"
            SELECT collection, key, version, written_at, payload, metadata
            FROM documents
            WHERE collection = $1 AND key = $2
            "#,
        )
        .bind(collection)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_document).transpose()
    }

    async fn list(&self, collection: &str) -> Result<Vec<StoredDocument>> {
        let rows = sqlx::query(
            r#"
            SELECT collection, key, version, written_at, payload, metadata
            FROM documents
            WHERE collection = $1
            ORDER BY written_at ASC, key ASC
            "#,
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_document).collect()
    }

    async fn delete(&self, collection: &str, key: &str, options: WriteOptions) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        let expected = options.expected_version.map(|v| v.as_i64());

        let result = sqlx::query(
            r#"
            DELETE FROM documents
            WHERE collection = $1 AND key = $2 AND ($3::BIGINT IS NULL OR version = $3)
            "#,
        )
        .bind(collection)
        .bind(key)
        .bind(expected)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        let key = DocumentKey::new(collection, key);
        let actual = current_version(&mut conn, &key).await?;
        match options.expected_version {
            Some(expected) if actual != Version::initial() => Err(StoreError::Conflict {
                key,
                expected,
                actual,
            }),
            _ => Ok(false),
        }
    }
}

struct PostgresTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PostgresTransaction {
    async fn put(&mut self, document: Document, options: WriteOptions) -> Result<Version> {
        write_document(&mut self.tx, document, options).await
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
