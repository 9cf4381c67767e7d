//! In-memory [`Store`] implementation for tests.
//!
//! Rows live in insertion-ordered `Vec`s behind `std::sync::RwLock`.

use std::collections::HashSet;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::models::{Dataset, DatasetCounts, DatasetSummary, Document, Sample};

use super::Store;

pub struct InMemoryStore {
    datasets: RwLock<Vec<Dataset>>,
    documents: RwLock<Vec<Document>>,
    samples: RwLock<Vec<Sample>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            datasets: RwLock::new(Vec::new()),
            documents: RwLock::new(Vec::new()),
            samples: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

// Writes only push after every check passes, so a poisoned lock never holds
// a partial row.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

#[async_trait]
impl Store for InMemoryStore {
    async fn insert_dataset(&self, dataset: &Dataset) -> Result<()> {
        let mut datasets = write(&self.datasets);
        if datasets.iter().any(|d| d.id == dataset.id) {
            bail!("dataset {} already exists", dataset.id);
        }
        datasets.push(dataset.clone());
        Ok(())
    }

    async fn get_dataset(&self, id: &str) -> Result<Option<Dataset>> {
        Ok(read(&self.datasets).iter().find(|d| d.id == id).cloned())
    }

    async fn list_datasets(&self) -> Result<Vec<DatasetSummary>> {
        let datasets = read(&self.datasets);
        let documents = read(&self.documents);
        let samples = read(&self.samples);

        // Reverse first so the stable sort keeps later inserts ahead on ties.
        let mut out: Vec<DatasetSummary> = datasets
            .iter()
            .rev()
            .map(|d| DatasetSummary {
                id: d.id.clone(),
                name: d.name.clone(),
                description: d.description.clone(),
                created_at: d.created_at,
                counts: DatasetCounts {
                    documents: documents.iter().filter(|x| x.dataset_id == d.id).count() as i64,
                    samples: samples.iter().filter(|x| x.dataset_id == d.id).count() as i64,
                },
            })
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    async fn insert_document(&self, document: &Document) -> Result<()> {
        if !read(&self.datasets)
            .iter()
            .any(|d| d.id == document.dataset_id)
        {
            bail!(
                "document {} references unknown dataset {}",
                document.id,
                document.dataset_id
            );
        }
        let mut documents = write(&self.documents);
        if documents.iter().any(|d| d.id == document.id) {
            bail!("document {} already exists", document.id);
        }
        documents.push(document.clone());
        Ok(())
    }

    async fn insert_sample(&self, sample: &Sample) -> Result<()> {
        if !read(&self.datasets)
            .iter()
            .any(|d| d.id == sample.dataset_id)
        {
            bail!(
                "sample {} references unknown dataset {}",
                sample.id,
                sample.dataset_id
            );
        }
        let same_dataset = read(&self.documents)
            .iter()
            .any(|d| d.id == sample.document_id && d.dataset_id == sample.dataset_id);
        if !same_dataset {
            bail!(
                "sample {} references document {} outside dataset {}",
                sample.id,
                sample.document_id,
                sample.dataset_id
            );
        }
        let mut samples = write(&self.samples);
        if samples.iter().any(|s| s.id == sample.id) {
            bail!("sample {} already exists", sample.id);
        }
        samples.push(sample.clone());
        Ok(())
    }

    async fn insert_parsed(&self, document: &Document, samples: &[Sample]) -> Result<()> {
        if !read(&self.datasets)
            .iter()
            .any(|d| d.id == document.dataset_id)
        {
            bail!(
                "document {} references unknown dataset {}",
                document.id,
                document.dataset_id
            );
        }
        let mut documents = write(&self.documents);
        let mut stored = write(&self.samples);
        if documents.iter().any(|d| d.id == document.id) {
            bail!("document {} already exists", document.id);
        }
        let mut seen = HashSet::new();
        for sample in samples {
            if sample.document_id != document.id || sample.dataset_id != document.dataset_id {
                bail!(
                    "sample {} references document {} outside dataset {}",
                    sample.id,
                    sample.document_id,
                    sample.dataset_id
                );
            }
            if !seen.insert(sample.id.as_str()) || stored.iter().any(|s| s.id == sample.id) {
                bail!("sample {} already exists", sample.id);
            }
        }
        documents.push(document.clone());
        stored.extend(samples.iter().cloned());
        Ok(())
    }

    async fn list_documents(&self, dataset_id: &str) -> Result<Vec<Document>> {
        Ok(read(&self.documents)
            .iter()
            .filter(|d| d.dataset_id == dataset_id)
            .cloned()
            .collect())
    }

    async fn list_samples(&self, dataset_id: &str, limit: usize) -> Result<Vec<Sample>> {
        Ok(read(&self.samples)
            .iter()
            .filter(|s| s.dataset_id == dataset_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count_documents(&self, dataset_id: &str) -> Result<i64> {
        Ok(read(&self.documents)
            .iter()
            .filter(|d| d.dataset_id == dataset_id)
            .count() as i64)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{DateTime, Utc};

    use crate::models::{Dataset, Document, ParseConfig, Sample, DATASET_VERSION};

    pub fn dataset(id: &str, name: &str, created_at: DateTime<Utc>) -> Dataset {
        Dataset {
            id: id.into(),
            name: name.into(),
            description: None,
            tags: vec![],
            storage_location: String::new(),
            parse_config: ParseConfig::default(),
            version_hash: DATASET_VERSION.into(),
            created_at,
        }
    }

    pub fn document(id: &str, dataset_id: &str, created_at: DateTime<Utc>) -> Document {
        Document {
            id: id.into(),
            dataset_id: dataset_id.into(),
            filename: "file.pdf".into(),
            file_hash: "abc".into(),
            page_count: 2,
            created_at,
        }
    }

    pub fn sample(
        id: &str,
        dataset_id: &str,
        document_id: &str,
        page: i64,
        created_at: DateTime<Utc>,
    ) -> Sample {
        Sample {
            id: id.into(),
            dataset_id: dataset_id.into(),
            document_id: document_id.into(),
            page_indices: vec![page],
            input_text: format!("page {}", page),
            expected_answer: None,
            tags: vec![],
            created_at,
        }
    }
}
