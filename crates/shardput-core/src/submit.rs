//! Submission capability boundary.
//!
//! The batcher never talks to the network itself. It hands an ordered slice
//! of records to a [`Submitter`] and reads back a [`SubmitReply`] that may
//! carry per-record outcomes, an attempt-level [`ApiError`], or both.

use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::batch::Record;

/// Attempt-level error reported by the ingestion API.
///
/// `code` is the service's machine-readable error code (for example
/// `ProvisionedThroughputExceededException`); see [`crate::classify`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Per-record outcome, positionally aligned with the submitted slice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecordOutcome {
    Accepted {
        shard_id: String,
        sequence_number: String,
    },
    Failed {
        error_code: String,
        error_message: String,
    },
}

impl RecordOutcome {
    #[must_use]
    pub fn accepted(shard_id: impl Into<String>, sequence_number: impl Into<String>) -> Self {
        Self::Accepted {
            shard_id: shard_id.into(),
            sequence_number: sequence_number.into(),
        }
    }

    #[must_use]
    pub fn failed(error_code: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self::Failed {
            error_code: error_code.into(),
            error_message: error_message.into(),
        }
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Everything one submission attempt reported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReply {
    /// Per-record outcomes; may be empty when the call failed wholesale.
    pub outcomes: Vec<RecordOutcome>,
    /// Failure count as reported by the service.
    pub failed_record_count: usize,
    /// Attempt-level error, if the call itself was rejected.
    pub error: Option<ApiError>,
}

impl SubmitReply {
    /// Every one of `count` records accepted; no per-record detail.
    #[must_use]
    pub fn accepted(count: usize) -> Self {
        Self {
            outcomes: (0..count)
                .map(|i| RecordOutcome::accepted("shardId-000000000000", i.to_string()))
                .collect(),
            failed_record_count: 0,
            error: None,
        }
    }

    /// The call failed wholesale with `error`; all `count` records failed.
    #[must_use]
    pub fn failed(error: ApiError, count: usize) -> Self {
        Self {
            outcomes: Vec::new(),
            failed_record_count: count,
            error: Some(error),
        }
    }

    /// Build from per-record outcomes, deriving the failure count.
    #[must_use]
    pub fn from_outcomes(outcomes: Vec<RecordOutcome>) -> Self {
        let failed_record_count = outcomes.iter().filter(|o| o.is_failed()).count();
        Self {
            outcomes,
            failed_record_count,
            error: None,
        }
    }

    /// Attach an attempt-level error.
    #[must_use]
    pub fn with_error(mut self, error: ApiError) -> Self {
        self.error = Some(error);
        self
    }

    /// No attempt-level error and nothing failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
            && self.failed_record_count == 0
            && !self.outcomes.iter().any(RecordOutcome::is_failed)
    }
}

/// Narrow "submit batch, get per-record outcomes" capability.
///
/// Implementations must be safe for concurrent use by many in-flight `put`
/// calls and must honor `cancel`.
pub trait Submitter: Send + Sync {
    fn submit(
        &self,
        cancel: &CancellationToken,
        records: &[Record],
    ) -> impl Future<Output = SubmitReply> + Send;
}

impl<S: Submitter> Submitter for Arc<S> {
    fn submit(
        &self,
        cancel: &CancellationToken,
        records: &[Record],
    ) -> impl Future<Output = SubmitReply> + Send {
        (**self).submit(cancel, records)
    }
}

impl<S: Submitter> Submitter for &S {
    fn submit(
        &self,
        cancel: &CancellationToken,
        records: &[Record],
    ) -> impl Future<Output = SubmitReply> + Send {
        (**self).submit(cancel, records)
    }
}
