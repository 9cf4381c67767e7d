//! Upload-then-parse workflow for datasets.
//!
//! # Pipeline
//!
//! ```text
//! create_dataset ──▶ row in `datasets` ──▶ pre-signed PUT URL
//!                                              │
//!                          client uploads the PDF to the raw key
//!                                              │
//! parse_dataset ──▶ fetch raw object ──▶ extract pages ──▶ 1 document + N samples
//! ```
//!
//! The raw object key is derived from the dataset id and name, so both steps
//! rebuild it independently:
//!
//! ```text
//! datasets/{dataset_id}/raw/{encodeURIComponent(name)}.pdf
//! ```
//!
//! A dataset is parsed at most once. A second parse of the same dataset
//! fails with [`IngestError::AlreadyParsed`]; callers that can race (the HTTP
//! API) run parses through the single-worker [`TaskQueue`](crate::queue::TaskQueue).
//! The queue only serializes parses within one process: `vlmds parse` calls
//! [`Ingestor::parse_dataset`] directly, so running it against a database a
//! live server is also parsing can still produce two documents.
//!
//! The document and its samples are written with
//! [`Store::insert_parsed`], so a failed write leaves nothing behind and the
//! parse can be retried.

use std::sync::Arc;

use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::IngestError;
use crate::extract::extract_text;
use crate::models::{
    now_millis, Dataset, DatasetDetail, DatasetSummary, Document, ParseConfig, Sample,
    DATASET_VERSION,
};
use crate::storage::{
    encode_uri_component, ObjectStorage, PresignMethod, StorageError, DEFAULT_PRESIGN_TTL_SECS,
};
use crate::store::Store;

/// Content type uploads are signed for.
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Samples included in a dataset detail view.
pub const SAMPLE_PREVIEW_LIMIT: usize = 100;

/// Result of [`Ingestor::create_dataset`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedDataset {
    pub dataset_id: String,
    pub object_key: String,
    pub upload_url: String,
}

/// Result of [`Ingestor::parse_dataset`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseOutcome {
    pub document_id: String,
    pub sample_count: usize,
}

/// Object key of a dataset's raw PDF upload.
pub fn raw_object_key(dataset_id: &str, name: &str) -> String {
    format!(
        "datasets/{}/raw/{}.pdf",
        dataset_id,
        encode_uri_component(name)
    )
}

fn hex_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Runs dataset operations against a record store and an object store.
#[derive(Clone)]
pub struct Ingestor {
    store: Arc<dyn Store>,
    storage: Arc<dyn ObjectStorage>,
}

impl Ingestor {
    pub fn new(store: Arc<dyn Store>, storage: Arc<dyn ObjectStorage>) -> Self {
        Self { store, storage }
    }

    /// Record a new dataset and issue the URL its PDF should be uploaded to.
    ///
    /// The name must contain something other than whitespace. It is stored and
    /// encoded into the object key exactly as given, so keys match uploads
    /// made by earlier clients. An empty description is stored as absent.
    /// The dataset row is written before the bucket check, so a storage
    /// failure leaves a dataset without an upload URL.
    pub async fn create_dataset(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<CreatedDataset, IngestError> {
        if name.trim().is_empty() {
            return Err(IngestError::validation("name", "must not be empty"));
        }
        let description = description
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);

        let dataset = Dataset {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            description,
            tags: Vec::new(),
            storage_location: String::new(),
            parse_config: ParseConfig::default(),
            version_hash: DATASET_VERSION.to_string(),
            created_at: now_millis(),
        };
        self.store.insert_dataset(&dataset).await?;
        tracing::info!(dataset_id = %dataset.id, name = %dataset.name, "dataset created");

        self.storage.ensure_bucket().await?;

        let object_key = raw_object_key(&dataset.id, &dataset.name);
        let upload_url = self.storage.presigned_url(
            &object_key,
            PresignMethod::Put,
            Some(PDF_CONTENT_TYPE),
            DEFAULT_PRESIGN_TTL_SECS,
        )?;

        Ok(CreatedDataset {
            dataset_id: dataset.id,
            object_key,
            upload_url,
        })
    }

    /// Fetch a dataset's uploaded PDF and store one sample per page.
    pub async fn parse_dataset(&self, dataset_id: &str) -> Result<ParseOutcome, IngestError> {
        let dataset = self
            .store
            .get_dataset(dataset_id)
            .await?
            .ok_or_else(|| IngestError::NotFound(format!("dataset {}", dataset_id)))?;

        if self.store.count_documents(&dataset.id).await? > 0 {
            return Err(IngestError::AlreadyParsed(dataset.id));
        }

        let key = raw_object_key(&dataset.id, &dataset.name);
        let bytes = self
            .storage
            .get_object_bytes(&key)
            .await
            .map_err(|e| match e {
                StorageError::NotFound { key } => IngestError::NotFound(format!("object {}", key)),
                other => IngestError::Storage(other),
            })?;
        let file_hash = hex_sha256(&bytes);
        tracing::debug!(dataset_id = %dataset.id, key = %key, bytes = bytes.len(), "raw object fetched");

        let extracted = tokio::task::spawn_blocking(move || extract_text(&bytes))
            .await
            .map_err(|e| IngestError::Internal(e.into()))??;
        let pages = extracted.pages();

        let document = Document {
            id: Uuid::new_v4().to_string(),
            dataset_id: dataset.id.clone(),
            filename: format!("{}.pdf", dataset.name),
            file_hash,
            page_count: pages.len() as i64,
            created_at: now_millis(),
        };
        let samples: Vec<Sample> = pages
            .into_iter()
            .enumerate()
            .map(|(index, text)| Sample {
                id: Uuid::new_v4().to_string(),
                dataset_id: dataset.id.clone(),
                document_id: document.id.clone(),
                page_indices: vec![index as i64],
                input_text: text,
                expected_answer: None,
                tags: Vec::new(),
                created_at: now_millis(),
            })
            .collect();
        self.store.insert_parsed(&document, &samples).await?;

        tracing::info!(
            dataset_id = %dataset.id,
            document_id = %document.id,
            samples = document.page_count,
            "dataset parsed"
        );

        Ok(ParseOutcome {
            document_id: document.id,
            sample_count: document.page_count as usize,
        })
    }

    /// Upload a PDF to a dataset's raw key from the server side.
    pub async fn upload_raw(&self, dataset_id: &str, bytes: Vec<u8>) -> Result<String, IngestError> {
        let dataset = self
            .store
            .get_dataset(dataset_id)
            .await?
            .ok_or_else(|| IngestError::NotFound(format!("dataset {}", dataset_id)))?;
        let key = raw_object_key(&dataset.id, &dataset.name);

        self.storage.ensure_bucket().await?;
        self.storage
            .put_object(&key, bytes, Some(PDF_CONTENT_TYPE))
            .await?;
        tracing::info!(dataset_id = %dataset.id, key = %key, "raw object uploaded");
        Ok(key)
    }

    pub async fn list_datasets(&self) -> Result<Vec<DatasetSummary>, IngestError> {
        Ok(self.store.list_datasets().await?)
    }

    /// A dataset with its documents and the first [`SAMPLE_PREVIEW_LIMIT`]
    /// samples in page order.
    pub async fn get_dataset(&self, dataset_id: &str) -> Result<DatasetDetail, IngestError> {
        let dataset = self
            .store
            .get_dataset(dataset_id)
            .await?
            .ok_or_else(|| IngestError::NotFound(format!("dataset {}", dataset_id)))?;
        let documents = self.store.list_documents(&dataset.id).await?;
        let samples = self
            .store
            .list_samples(&dataset.id, SAMPLE_PREVIEW_LIMIT)
            .await?;
        Ok(DatasetDetail {
            dataset,
            documents,
            samples,
        })
    }

    /// Create the bucket if it does not exist yet.
    pub async fn ensure_bucket(&self) -> Result<(), IngestError> {
        Ok(self.storage.ensure_bucket().await?)
    }

    /// Pre-sign an arbitrary key in the bucket. Signing is local; call
    /// [`ensure_bucket`](Self::ensure_bucket) first if the URL must be usable
    /// on a fresh deployment.
    pub fn presign(
        &self,
        key: &str,
        method: PresignMethod,
        content_type: Option<&str>,
        ttl_secs: u64,
    ) -> Result<String, IngestError> {
        if key.trim().is_empty() {
            return Err(IngestError::validation("key", "must not be empty"));
        }
        let content_type = content_type.map(str::trim).filter(|c| !c.is_empty());
        Ok(self
            .storage
            .presigned_url(key, method, content_type, ttl_secs)?)
    }
}
