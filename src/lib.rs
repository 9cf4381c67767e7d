//! # vlm-datasets
//!
//! A small service for building evaluation datasets out of PDF documents.
//!
//! A dataset is created first and handed a pre-signed upload URL. Once the
//! client has uploaded its PDF, a parse step fetches the object, extracts
//! the text page by page and stores one sample per page.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌─────────────┐   ┌──────────┐
//! │ CLI/HTTP │──▶│  Ingest  │──▶│ Object store│   │  SQLite  │
//! │ (vlmds)  │   │ workflow │──▶│  (S3/MinIO) │   │ datasets │
//! └──────────┘   └────┬─────┘   └─────────────┘   │ documents│
//!                     │                           │ samples  │
//!                     ├──▶ Extract (lopdf) ─────▶ └──────────┘
//!                     ▼
//!               Task queue (1 worker)
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! vlmds init                          # create tables
//! vlmds create "Report A"             # prints dataset id and upload URL
//! vlmds upload <id> report.pdf        # or PUT the file to the URL yourself
//! vlmds parse <id>
//! vlmds show <id>
//! vlmds serve                         # JSON API on BIND_ADDR
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Environment configuration |
//! | [`models`] | Dataset, document and sample types |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`store`] | Record storage trait and backends |
//! | [`storage`] | Object storage trait, S3 client, pre-signing |
//! | [`extract`] | Per-page PDF text extraction |
//! | [`queue`] | Single-worker task queue |
//! | [`ingest`] | Create / upload / parse workflow |
//! | [`error`] | Workflow error taxonomy |
//! | [`server`] | JSON HTTP API |

pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod queue;
pub mod server;
pub mod storage;
pub mod store;
