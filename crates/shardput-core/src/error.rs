//! Error types for shardput-core
//!
//! Callers only ever see one of the terminal kinds below. Per-attempt
//! throttling is handled inside the batcher and surfaces only as
//! [`Error::RetriesExhausted`] once the retry budget is spent.

use std::fmt::Write;
use thiserror::Error;

/// Actionable remediation guidance for an error
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Remediation {
    /// One-line summary of how to fix the issue
    pub summary: String,
    /// Additional alternative guidance
    pub alternatives: Vec<String>,
}

impl Remediation {
    /// Create a new remediation with a summary
    #[must_use]
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            alternatives: Vec::new(),
        }
    }

    /// Add an alternative suggestion
    #[must_use]
    pub fn alternative(mut self, alternative: impl Into<String>) -> Self {
        self.alternatives.push(alternative.into());
        self
    }

    /// Render remediation text for human-readable output
    #[must_use]
    pub fn render_plain(&self) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "To fix:");
        let _ = writeln!(output, "  {}", self.summary);

        if !self.alternatives.is_empty() {
            let _ = writeln!(output, "  Alternatives:");
            for alt in &self.alternatives {
                let _ = writeln!(output, "    - {alt}");
            }
        }

        output
    }
}

/// Result type alias using the library's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for shardput-core
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid construction inputs (blank stream name, missing submitter, bad policy)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Record rejected before it ever reached a batch
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Destination-level rejection; the whole batch was abandoned
    #[error(
        "Permanent failure writing to stream {stream}: {code}: {message} ({failed_records} records not delivered)"
    )]
    Permanent {
        stream: String,
        code: String,
        message: String,
        failed_records: usize,
    },

    /// Transient failures outlived the retry budget
    #[error(
        "Retries exhausted writing to stream {stream} after {attempts} attempts: {failed_records} records still failing (last reason: {last_reason})"
    )]
    RetriesExhausted {
        stream: String,
        attempts: u32,
        failed_records: usize,
        last_reason: String,
    },

    /// The caller's cancellation token fired
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// Configuration file errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Coarse classification exposed to calling pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad construction or input; fixing requires a code or config change.
    Configuration,
    /// Do not retry upstream either.
    Permanent,
    /// Upstream may retry the batch later.
    Retryable,
    /// The caller gave up; not a delivery verdict.
    Cancelled,
}

impl Error {
    /// Stable error-kind mapping for upstream retry decisions.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) | Self::InvalidRecord(_) | Self::Config(_) => {
                ErrorKind::Configuration
            }
            Self::Permanent { .. } => ErrorKind::Permanent,
            Self::RetriesExhausted { .. } => ErrorKind::Retryable,
            Self::Cancelled(_) => ErrorKind::Cancelled,
        }
    }

    /// Number of records that were not delivered, when known.
    #[must_use]
    pub fn failed_records(&self) -> Option<usize> {
        match self {
            Self::Permanent { failed_records, .. }
            | Self::RetriesExhausted { failed_records, .. } => Some(*failed_records),
            _ => None,
        }
    }

    /// Return remediation guidance when available.
    #[must_use]
    pub fn remediation(&self) -> Option<Remediation> {
        match self {
            Self::Configuration(_) => Some(
                Remediation::new("Fix the producer construction arguments and rebuild the batcher.")
                    .alternative("Check that a stream name and a submitter were both supplied."),
            ),
            Self::InvalidRecord(_) => Some(
                Remediation::new("Shrink the record payload or partition key below service limits.")
                    .alternative("Split oversized telemetry into several records."),
            ),
            Self::Permanent { stream, .. } => Some(
                Remediation::new(format!(
                    "Verify that stream '{stream}' exists and that the producer may write to it."
                ))
                .alternative("Check region, account, and encryption key permissions."),
            ),
            Self::RetriesExhausted { .. } => Some(
                Remediation::new("The stream is throttling writes; add shards or slow producers.")
                    .alternative("Increase the retry budget if throttling is brief and bursty."),
            ),
            Self::Cancelled(_) => Some(
                Remediation::new("Operation was cancelled. Retry if that was unexpected.")
                    .alternative("Check whether a timeout or shutdown triggered the cancellation."),
            ),
            Self::Config(err) => Some(err.remediation()),
        }
    }
}

/// Whether `err` must not be retried by the calling pipeline.
#[must_use]
pub fn is_permanent(err: &Error) -> bool {
    matches!(err.kind(), ErrorKind::Permanent | ErrorKind::Configuration)
}

/// Whether the calling pipeline may resubmit the batch later.
#[must_use]
pub fn is_retryable(err: &Error) -> bool {
    err.kind() == ErrorKind::Retryable
}

/// Whether `err` reports caller cancellation.
#[must_use]
pub fn is_cancelled(err: &Error) -> bool {
    err.kind() == ErrorKind::Cancelled
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config parsed but holds unusable values
    #[error("Invalid config value: {0}")]
    Invalid(String),
}

impl ConfigError {
    #[must_use]
    pub fn remediation(&self) -> Remediation {
        match self {
            Self::Io { path, .. } => {
                Remediation::new(format!("Check that {path} exists and is readable."))
                    .alternative("Pass the config path explicitly.")
            }
            Self::Parse(_) => Remediation::new("Fix the TOML syntax in the producer config.")
                .alternative("Compare against the documented [retry] and [log] sections."),
            Self::Invalid(_) => Remediation::new("Correct the reported config value.")
                .alternative("Remove the key to fall back to its default."),
        }
    }
}
