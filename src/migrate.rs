use anyhow::Result;
use sqlx::SqlitePool;

/// Create the dataset tables and indexes. Safe to run on every startup.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS datasets (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT,
            tags_json TEXT NOT NULL DEFAULT '[]',
            storage_location TEXT NOT NULL DEFAULT '',
            parse_config_json TEXT NOT NULL,
            version_hash TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // (id, dataset_id) is unique so samples can reference both at once.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            dataset_id TEXT NOT NULL,
            filename TEXT NOT NULL,
            file_hash TEXT NOT NULL,
            page_count INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            UNIQUE(id, dataset_id),
            FOREIGN KEY (dataset_id) REFERENCES datasets(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS samples (
            id TEXT PRIMARY KEY,
            dataset_id TEXT NOT NULL,
            document_id TEXT NOT NULL,
            page_indices_json TEXT NOT NULL,
            input_text TEXT NOT NULL,
            expected_answer TEXT,
            tags_json TEXT NOT NULL DEFAULT '[]',
            created_at INTEGER NOT NULL,
            FOREIGN KEY (dataset_id) REFERENCES datasets(id),
            FOREIGN KEY (document_id, dataset_id) REFERENCES documents(id, dataset_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_datasets_created_at ON datasets(created_at DESC)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_dataset_id ON documents(dataset_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_samples_dataset_id ON samples(dataset_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_samples_document_id ON samples(document_id)")
        .execute(pool)
        .await?;

    Ok(())
}
