//! Core data models: datasets, the documents uploaded into them, and the
//! per-page samples parsed out of those documents.
//!
//! All types serialize with camelCase field names, which is the JSON shape
//! served by the HTTP API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Version marker written on every new dataset.
pub const DATASET_VERSION: &str = "v1";

/// How a dataset's documents are turned into samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
    /// One sample per page of extracted text.
    #[default]
    Text,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseConfig {
    pub mode: ParseMode,
}

/// A named collection of uploaded documents and their samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub storage_location: String,
    pub parse_config: ParseConfig,
    pub version_hash: String,
    pub created_at: DateTime<Utc>,
}

/// A PDF that has been fetched from object storage and parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub dataset_id: String,
    pub filename: String,
    /// Hex SHA-256 of the raw PDF bytes.
    pub file_hash: String,
    pub page_count: i64,
    pub created_at: DateTime<Utc>,
}

/// One unit of evaluation input, currently the text of a single page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    pub id: String,
    pub dataset_id: String,
    pub document_id: String,
    pub page_indices: Vec<i64>,
    pub input_text: String,
    pub expected_answer: Option<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetCounts {
    pub documents: i64,
    pub samples: i64,
}

/// Listing row for `GET /datasets`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetSummary {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub counts: DatasetCounts,
}

/// Dataset with its documents and a bounded slice of samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetDetail {
    pub dataset: Dataset,
    pub documents: Vec<Document>,
    pub samples: Vec<Sample>,
}

/// Current wall-clock time truncated to millisecond precision, the
/// resolution timestamps are stored at.
pub fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}
