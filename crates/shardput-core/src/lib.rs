//! shardput-core: reliable record delivery to sharded streaming ingestion services
//!
//! Accepts a logical batch of opaque records, submits it through an injected
//! [`Submitter`], interprets partial-failure replies, and retries only the
//! records that failed transiently.
//!
//! # Architecture
//!
//! ```text
//! Batch ──► Batcher::put ──► Submitter::submit ──► SubmitReply
//!                ▲                                    │
//!                └── backoff ◄── classify_reply ◄─────┘
//! ```
//!
//! # Modules
//!
//! - `batch`: ordered record container with service size limits
//! - `submit`: the submission capability boundary and reply types
//! - `classify`: error-code and reply classification
//! - `retry`: exponential backoff policy and cancellable sleep
//! - `batcher`: the submit-and-retry protocol
//! - `stats`: per-batcher delivery counters
//! - `error`: terminal error taxonomy and permanence predicates
//! - `config`: TOML producer configuration
//! - `logging`: tracing subscriber setup
//!
//! # Safety
//!
//! This crate forbids unsafe code.

#![forbid(unsafe_code)]

pub mod batch;
pub mod batcher;
pub mod classify;
pub mod config;
pub mod error;
pub mod logging;
pub mod retry;
pub mod stats;
pub mod submit;

pub use batch::{Batch, Record};
pub use batcher::{Batcher, BatcherBuilder, BatcherOptions, PutReport};
pub use classify::{FailureClass, classify, classify_code};
pub use error::{Error, ErrorKind, Result, is_cancelled, is_permanent, is_retryable};
pub use retry::RetryPolicy;
pub use submit::{ApiError, RecordOutcome, SubmitReply, Submitter};
pub use tokio_util::sync::CancellationToken;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
