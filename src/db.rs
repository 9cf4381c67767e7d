use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Open a pool for a `sqlite:` database URL, creating the file (and its
/// parent directory) when it does not exist yet.
pub async fn connect(database_url: &str) -> Result<SqlitePool> {
    if let Some(path) = file_path(database_url) {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
    }

    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// The on-disk path of a sqlite URL, or `None` for in-memory databases.
fn file_path(database_url: &str) -> Option<&str> {
    let rest = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or(rest);
    if path.is_empty() || path == ":memory:" {
        None
    } else {
        Some(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_path_strips_scheme_and_query() {
        assert_eq!(file_path("sqlite://data/a.sqlite"), Some("data/a.sqlite"));
        assert_eq!(file_path("sqlite:data/a.sqlite?mode=rwc"), Some("data/a.sqlite"));
        assert_eq!(file_path("sqlite::memory:"), None);
        assert_eq!(file_path("postgres://localhost/db"), None);
    }

    #[tokio::test]
    async fn connect_creates_parent_directory() {
        let tmp = tempfile::TempDir::new().unwrap();
        let db_path = tmp.path().join("nested").join("datasets.sqlite");
        let url = format!("sqlite://{}", db_path.display());
        let pool = connect(&url).await.unwrap();
        pool.close().await;
        assert!(db_path.exists());
    }
}
