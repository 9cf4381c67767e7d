//! SQLite-backed [`Store`] implementation.
//!
//! List-valued fields (`tags`, `pageIndices`, `parseConfig`) are stored as
//! JSON text; timestamps are stored as Unix milliseconds.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite, SqlitePool};

use crate::models::{Dataset, DatasetCounts, DatasetSummary, Document, Sample};

use super::Store;

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| anyhow!("timestamp out of range: {}", ms))
}

fn row_to_dataset(row: &SqliteRow) -> Result<Dataset> {
    let tags_json: String = row.try_get("tags_json")?;
    let parse_config_json: String = row.try_get("parse_config_json")?;
    Ok(Dataset {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        tags: serde_json::from_str(&tags_json)?,
        storage_location: row.try_get("storage_location")?,
        parse_config: serde_json::from_str(&parse_config_json)?,
        version_hash: row.try_get("version_hash")?,
        created_at: from_millis(row.try_get("created_at")?)?,
    })
}

fn row_to_document(row: &SqliteRow) -> Result<Document> {
    Ok(Document {
        id: row.try_get("id")?,
        dataset_id: row.try_get("dataset_id")?,
        filename: row.try_get("filename")?,
        file_hash: row.try_get("file_hash")?,
        page_count: row.try_get("page_count")?,
        created_at: from_millis(row.try_get("created_at")?)?,
    })
}

fn row_to_sample(row: &SqliteRow) -> Result<Sample> {
    let pages_json: String = row.try_get("page_indices_json")?;
    let tags_json: String = row.try_get("tags_json")?;
    Ok(Sample {
        id: row.try_get("id")?,
        dataset_id: row.try_get("dataset_id")?,
        document_id: row.try_get("document_id")?,
        page_indices: serde_json::from_str(&pages_json)?,
        input_text: row.try_get("input_text")?,
        expected_answer: row.try_get("expected_answer")?,
        tags: serde_json::from_str(&tags_json)?,
        created_at: from_millis(row.try_get("created_at")?)?,
    })
}

async fn write_document<'e, E>(executor: E, document: &Document) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO documents (id, dataset_id, filename, file_hash, page_count, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&document.id)
    .bind(&document.dataset_id)
    .bind(&document.filename)
    .bind(&document.file_hash)
    .bind(document.page_count)
    .bind(document.created_at.timestamp_millis())
    .execute(executor)
    .await?;
    Ok(())
}

async fn write_sample<'e, E>(executor: E, sample: &Sample) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO samples (id, dataset_id, document_id, page_indices_json, input_text,
                             expected_answer, tags_json, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&sample.id)
    .bind(&sample.dataset_id)
    .bind(&sample.document_id)
    .bind(serde_json::to_string(&sample.page_indices)?)
    .bind(&sample.input_text)
    .bind(&sample.expected_answer)
    .bind(serde_json::to_string(&sample.tags)?)
    .bind(sample.created_at.timestamp_millis())
    .execute(executor)
    .await?;
    Ok(())
}

#[async_trait]
impl Store for SqliteStore {
    async fn insert_dataset(&self, dataset: &Dataset) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO datasets (id, name, description, tags_json, storage_location,
                                  parse_config_json, version_hash, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&dataset.id)
        .bind(&dataset.name)
        .bind(&dataset.description)
        .bind(serde_json::to_string(&dataset.tags)?)
        .bind(&dataset.storage_location)
        .bind(serde_json::to_string(&dataset.parse_config)?)
        .bind(&dataset.version_hash)
        .bind(dataset.created_at.timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_dataset(&self, id: &str) -> Result<Option<Dataset>> {
        let row = sqlx::query("SELECT * FROM datasets WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_dataset).transpose()
    }

    async fn list_datasets(&self) -> Result<Vec<DatasetSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT d.id, d.name, d.description, d.created_at,
                   (SELECT COUNT(*) FROM documents WHERE dataset_id = d.id) AS document_count,
                   (SELECT COUNT(*) FROM samples WHERE dataset_id = d.id) AS sample_count
            FROM datasets d
            ORDER BY d.created_at DESC, d.rowid DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<DatasetSummary> {
                Ok(DatasetSummary {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                    description: row.try_get("description")?,
                    created_at: from_millis(row.try_get("created_at")?)?,
                    counts: DatasetCounts {
                        documents: row.try_get("document_count")?,
                        samples: row.try_get("sample_count")?,
                    },
                })
            })
            .collect()
    }

    async fn insert_document(&self, document: &Document) -> Result<()> {
        write_document(&self.pool, document).await
    }

    async fn insert_sample(&self, sample: &Sample) -> Result<()> {
        write_sample(&self.pool, sample).await
    }

    async fn insert_parsed(&self, document: &Document, samples: &[Sample]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        write_document(&mut *tx, document).await?;
        for sample in samples {
            write_sample(&mut *tx, sample).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn list_documents(&self, dataset_id: &str) -> Result<Vec<Document>> {
        let rows = sqlx::query("SELECT * FROM documents WHERE dataset_id = ? ORDER BY rowid")
            .bind(dataset_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_document).collect()
    }

    async fn list_samples(&self, dataset_id: &str, limit: usize) -> Result<Vec<Sample>> {
        let rows =
            sqlx::query("SELECT * FROM samples WHERE dataset_id = ? ORDER BY rowid LIMIT ?")
                .bind(dataset_id)
                .bind(i64::try_from(limit).unwrap_or(i64::MAX))
                .fetch_all(&self.pool)
                .await?;
        rows.iter().map(row_to_sample).collect()
    }

    async fn count_documents(&self, dataset_id: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE dataset_id = ?")
            .bind(dataset_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
