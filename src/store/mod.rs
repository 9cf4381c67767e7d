//! Storage abstraction for dataset records.
//!
//! The [`Store`] trait covers every relational operation the ingestion
//! workflow and the HTTP API need. Two backends exist:
//!
//! - [`SqliteStore`](sqlite::SqliteStore) for real deployments.
//! - [`InMemoryStore`](memory::InMemoryStore) for tests.
//!
//! There are no updates or deletes. Every write is a single-row insert,
//! except [`insert_parsed`](Store::insert_parsed), which writes a document and
//! all of its samples or nothing.
//! Both backends reject documents and samples whose dataset does not exist,
//! and samples whose document belongs to a different dataset.
//!
//! # Operations
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`insert_dataset`](Store::insert_dataset) | Persist a new dataset |
//! | [`get_dataset`](Store::get_dataset) | Fetch one dataset by id |
//! | [`list_datasets`](Store::list_datasets) | Newest-first summaries with counts |
//! | [`insert_document`](Store::insert_document) | Persist a parsed document |
//! | [`insert_sample`](Store::insert_sample) | Persist one sample |
//! | [`insert_parsed`](Store::insert_parsed) | Persist a document with its samples atomically |
//! | [`list_documents`](Store::list_documents) | Documents of a dataset |
//! | [`list_samples`](Store::list_samples) | Samples of a dataset, in page order |
//! | [`count_documents`](Store::count_documents) | Number of documents in a dataset |

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Dataset, DatasetSummary, Document, Sample};

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_dataset(&self, dataset: &Dataset) -> Result<()>;

    async fn get_dataset(&self, id: &str) -> Result<Option<Dataset>>;

    /// All datasets, newest first. Datasets created in the same millisecond
    /// are ordered by insertion, latest first.
    async fn list_datasets(&self) -> Result<Vec<DatasetSummary>>;

    async fn insert_document(&self, document: &Document) -> Result<()>;

    async fn insert_sample(&self, sample: &Sample) -> Result<()>;

    /// Write a document and its samples as one unit. On error neither the
    /// document nor any sample is stored.
    async fn insert_parsed(&self, document: &Document, samples: &[Sample]) -> Result<()>;

    async fn list_documents(&self, dataset_id: &str) -> Result<Vec<Document>>;

    /// Samples of a dataset in insertion order, which is ascending page
    /// order within a document.
    async fn list_samples(&self, dataset_id: &str, limit: usize) -> Result<Vec<Sample>>;

    async fn count_documents(&self, dataset_id: &str) -> Result<i64>;
}
