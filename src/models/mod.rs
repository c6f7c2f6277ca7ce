//! Data models for DocGate.
//!
//! - [`Configuration`]: every processing option of a gateway project, persisted as a YAML document
//! - [`JobStatus`] / [`JobState`]: snapshot and lifecycle of a running job
//! - [`FileOutcome`] / [`BatchSummary`]: per-file and per-batch results
//!
//! # Architecture Note
//!
//! The models are plain data:
//! - **Serializable**: `Configuration` round-trips through `serde_yaml_ng`; status types serialize for reporting
//! - **Cloneable**: observers read cloned snapshots; only a job's worker writes the live [`JobStatus`]

pub mod config;
pub mod job;

pub use config::{Configuration, DocumentType, ProcessingMode, ValidationError};
pub use job::{BatchSummary, FileOutcome, JobMode, JobReport, JobState, JobStatus};
