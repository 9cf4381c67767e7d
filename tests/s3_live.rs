//! Round trip against a real S3-compatible endpoint.
//!
//! Needs `S3_ENDPOINT`, `S3_ACCESS_KEY_ID`, `S3_SECRET_ACCESS_KEY` and
//! `S3_BUCKET` in the environment (a local MinIO works):
//!
//! ```bash
//! cargo test --test s3_live -- --ignored
//! ```

mod common;

use std::sync::Arc;

use vlm_datasets::config::Config;
use vlm_datasets::ingest::Ingestor;
use vlm_datasets::storage::{ObjectStorage, PresignMethod, S3Storage, StorageError};
use vlm_datasets::store::InMemoryStore;

fn live_config() -> Config {
    let mut vars: Vec<(String, String)> = std::env::vars().collect();
    if !vars.iter().any(|(k, _)| k == "DATABASE_URL") {
        vars.push(("DATABASE_URL".into(), "sqlite::memory:".into()));
    }
    Config::from_vars(vars).expect("S3_* variables must be set for live tests")
}

#[tokio::test]
#[ignore]
async fn presigned_put_then_parse() {
    let config = live_config();
    let storage = Arc::new(S3Storage::new(&config.s3).unwrap());
    let ingestor = Ingestor::new(Arc::new(InMemoryStore::new()), storage.clone());

    let created = ingestor
        .create_dataset("Live Report", Some("s3 round trip"))
        .await
        .unwrap();

    let pdf = common::build_pdf(&["Live one", "Live two"]);
    let resp = reqwest::Client::new()
        .put(&created.upload_url)
        .header("Content-Type", "application/pdf")
        .body(pdf.clone())
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success(), "upload failed: {}", resp.status());

    let fetched = storage.get_object_bytes(&created.object_key).await.unwrap();
    assert_eq!(fetched, pdf);

    let get_url = storage
        .presigned_url(&created.object_key, PresignMethod::Get, None, 60)
        .unwrap();
    let body = reqwest::get(&get_url).await.unwrap().bytes().await.unwrap();
    assert_eq!(body.to_vec(), pdf);

    let outcome = ingestor.parse_dataset(&created.dataset_id).await.unwrap();
    assert_eq!(outcome.sample_count, 2);
}

#[tokio::test]
#[ignore]
async fn missing_object_is_not_found() {
    let config = live_config();
    let storage = S3Storage::new(&config.s3).unwrap();
    storage.ensure_bucket().await.unwrap();
    // second call must also succeed
    storage.ensure_bucket().await.unwrap();

    let err = storage
        .get_object_bytes("datasets/none/raw/missing.pdf")
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound { .. }));
}
