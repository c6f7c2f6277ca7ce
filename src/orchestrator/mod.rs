//! Processing orchestrator - job lifecycle over a [`GatewayClient`](crate::services::GatewayClient).
//!
//! # Components
//!
//! - [`JobController`]: validates a configuration, starts one background job
//!   at a time (batch or monitor), and exposes cancel, wait and status
//! - `monitor`: the continuous poll loop behind [`JobMode::Monitor`](crate::models::JobMode)
//! - [`JobProgress`] / [`SeenSet`]: the worker-owned record of which files a
//!   job has handled
//!
//! # Concurrency
//!
//! Each job runs as a single tokio task. Files are processed strictly one at a
//! time, in the order discovery returns them. Cancellation travels over a
//! `tokio::sync::watch` channel and is observed between files and between
//! polls; a file already handed to the gateway always finishes.

pub mod controller;
mod monitor;
pub mod progress;
mod worker;

pub use controller::{JobController, JobError, JobOptions};
pub use progress::{JobProgress, SeenSet};
