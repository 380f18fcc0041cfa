//! Submit-and-retry protocol for one logical batch.
//!
//! [`Batcher::put`] submits the whole batch, classifies the reply, and
//! resubmits only the records that failed transiently, with backoff between
//! attempts. Each call owns its retry state; the batcher itself only holds
//! the immutable submitter, policy, and logger plus observability counters,
//! so `put` may run concurrently from many tasks.
//!
//! ```text
//! Idle → Submitting ─┬─ Succeeded
//!                    ├─ PermanentlyFailed
//!                    └─ PartiallyFailed → Backoff → Submitting
//!                                        └─ RetriesExhausted
//! (any waiting or in-flight state) → Cancelled
//! ```

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::instrument::WithSubscriber;
use tracing::{Dispatch, Instrument, debug, error, warn};

use crate::batch::Batch;
use crate::classify::{AttemptVerdict, classify_reply};
use crate::error::{Error, Result};
use crate::retry::{RetryPolicy, sleep_or_cancel};
use crate::stats::{BatcherStats, BatcherStatsSnapshot};
use crate::submit::Submitter;

/// Longest stream name the ingestion service accepts.
pub const MAX_STREAM_NAME_LEN: usize = 128;

/// Optional construction settings.
#[derive(Debug, Clone, Default)]
pub struct BatcherOptions {
    /// Structured sink for attempt/outcome events. When `None`, events go to
    /// the global subscriber; delivery behavior is the same either way.
    pub logger: Option<Dispatch>,
    pub retry_policy: RetryPolicy,
}

/// Summary of a successful `put`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PutReport {
    /// Submission calls made, including the first.
    pub attempts: u32,
    /// Records in the original batch.
    pub records: usize,
    /// Record resubmissions across all retries.
    pub retried_records: usize,
    /// Sum of backoff delays waited.
    pub total_backoff: Duration,
}

/// Per-call retry bookkeeping; never shared between calls.
struct RetryState {
    attempt: u32,
    /// Original batch positions of the records still to deliver.
    pending: Vec<usize>,
    retried_records: usize,
    total_backoff: Duration,
    last_reason: Option<String>,
}

impl RetryState {
    fn new(records: usize) -> Self {
        Self {
            attempt: 0,
            pending: (0..records).collect(),
            retried_records: 0,
            total_backoff: Duration::ZERO,
            last_reason: None,
        }
    }
}

/// Reliable producer bound to one destination stream.
pub struct Batcher<S> {
    submitter: S,
    stream: String,
    policy: RetryPolicy,
    logger: Option<Dispatch>,
    stats: BatcherStats,
}

impl<S> fmt::Debug for Batcher<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Batcher")
            .field("stream", &self.stream)
            .field("policy", &self.policy)
            .field("has_logger", &self.logger.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Batcher`].
pub struct BatcherBuilder<S> {
    stream: String,
    submitter: Option<S>,
    options: BatcherOptions,
}

impl<S: Submitter> BatcherBuilder<S> {
    #[must_use]
    pub fn new(stream: impl Into<String>) -> Self {
        Self {
            stream: stream.into(),
            submitter: None,
            options: BatcherOptions::default(),
        }
    }

    #[must_use]
    pub fn submitter(mut self, submitter: S) -> Self {
        self.submitter = Some(submitter);
        self
    }

    #[must_use]
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.options.retry_policy = policy;
        self
    }

    #[must_use]
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.options.retry_policy.max_attempts = max_attempts;
        self
    }

    #[must_use]
    pub fn logger(mut self, logger: Dispatch) -> Self {
        self.options.logger = Some(logger);
        self
    }

    pub fn build(self) -> Result<Batcher<S>> {
        let submitter = self
            .submitter
            .ok_or_else(|| Error::Configuration("a submitter is required".to_string()))?;
        Batcher::new(submitter, self.stream, self.options)
    }
}

impl<S: Submitter> Batcher<S> {
    #[must_use]
    pub fn builder(stream: impl Into<String>) -> BatcherBuilder<S> {
        BatcherBuilder::new(stream)
    }

    /// Build a batcher writing to `stream` through `submitter`.
    pub fn new(submitter: S, stream: impl Into<String>, options: BatcherOptions) -> Result<Self> {
        let stream = stream.into();
        if stream.trim().is_empty() {
            return Err(Error::Configuration("stream name must not be empty".to_string()));
        }
        if stream.len() > MAX_STREAM_NAME_LEN {
            return Err(Error::Configuration(format!(
                "stream name is {} characters, max {MAX_STREAM_NAME_LEN}",
                stream.len()
            )));
        }
        options.retry_policy.validate()?;

        Ok(Self {
            submitter,
            stream,
            policy: options.retry_policy,
            logger: options.logger,
            stats: BatcherStats::new(),
        })
    }

    #[must_use]
    pub fn stream(&self) -> &str {
        &self.stream
    }

    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.policy
    }

    #[must_use]
    pub fn submitter(&self) -> &S {
        &self.submitter
    }

    /// Delivery counters summed over every `put` on this batcher.
    ///
    /// The counters are relaxed atomics updated for observability only; the
    /// retry loop never reads them.
    #[must_use]
    pub fn stats(&self) -> BatcherStatsSnapshot {
        self.stats.snapshot()
    }

    /// Deliver every record in `batch` or fail with a terminal error.
    ///
    /// Returns `Ok(())` once all records were accepted. Errors are
    /// [`Error::Permanent`], [`Error::RetriesExhausted`], or
    /// [`Error::Cancelled`]; use [`crate::is_permanent`] and friends to tell
    /// them apart.
    pub async fn put(&self, cancel: &CancellationToken, batch: &Batch) -> Result<()> {
        self.put_with_report(cancel, batch).await.map(|_| ())
    }

    /// Like [`Batcher::put`], returning attempt details on success.
    pub async fn put_with_report(
        &self,
        cancel: &CancellationToken,
        batch: &Batch,
    ) -> Result<PutReport> {
        match &self.logger {
            Some(dispatch) => {
                self.deliver(cancel, batch)
                    .with_subscriber(dispatch.clone())
                    .await
            }
            None => self.deliver(cancel, batch).await,
        }
    }

    async fn deliver(&self, cancel: &CancellationToken, batch: &Batch) -> Result<PutReport> {
        let span = tracing::debug_span!("put", stream = %self.stream, records = batch.len());
        self.run(cancel, batch).instrument(span).await
    }

    async fn run(&self, cancel: &CancellationToken, batch: &Batch) -> Result<PutReport> {
        if batch.is_empty() {
            return Ok(PutReport::default());
        }
        if cancel.is_cancelled() {
            self.stats.record_cancelled();
            return Err(Error::Cancelled(format!(
                "put to stream {} cancelled before submission",
                self.stream
            )));
        }

        let mut state = RetryState::new(batch.len());
        let mut retry_batch: Option<Batch> = None;

        loop {
            state.attempt += 1;
            let current = retry_batch.as_ref().unwrap_or(batch);
            let records = current.records();
            let submitted = records.len();

            self.stats.record_submission();
            debug!(
                attempt = state.attempt,
                records = submitted,
                bytes = current.total_bytes(),
                "Submitting records"
            );

            let reply = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    return Err(self.cancelled(&state, "during submission"));
                }
                reply = self.submitter.submit(cancel, records) => reply,
            };

            match classify_reply(&reply, submitted) {
                AttemptVerdict::Success => {
                    self.stats.record_accepted(submitted);
                    self.stats.record_ok();
                    debug!(
                        stream = %self.stream,
                        attempts = state.attempt,
                        records = batch.len(),
                        "Successfully wrote batch"
                    );
                    return Ok(PutReport {
                        attempts: state.attempt,
                        records: batch.len(),
                        retried_records: state.retried_records,
                        total_backoff: state.total_backoff,
                    });
                }
                AttemptVerdict::Permanent { code, message } => {
                    self.stats.record_permanent();
                    error!(
                        stream = %self.stream,
                        attempt = state.attempt,
                        failed_records = submitted,
                        code = %code,
                        reason = %message,
                        "Permanent failure writing records; abandoning batch"
                    );
                    return Err(Error::Permanent {
                        stream: self.stream.clone(),
                        code,
                        message,
                        failed_records: submitted,
                    });
                }
                AttemptVerdict::Transient {
                    failed,
                    reason,
                    throttled,
                } => {
                    self.stats
                        .record_accepted(submitted.saturating_sub(failed.len()));
                    state.pending = failed.iter().map(|&i| state.pending[i]).collect();
                    state.last_reason = Some(reason);

                    if state.attempt >= self.policy.max_attempts {
                        return Err(self.exhausted(&state));
                    }

                    let delay = self.policy.delay_for_attempt(state.attempt - 1);
                    self.stats.record_retry(state.pending.len(), throttled);
                    if throttled {
                        warn!(
                            attempt = state.attempt,
                            failed_records = state.pending.len(),
                            delay_ms = delay.as_millis() as u64,
                            reason = state.last_reason.as_deref().unwrap_or_default(),
                            "Throttled; retrying failed records after backoff"
                        );
                    } else {
                        debug!(
                            attempt = state.attempt,
                            failed_records = state.pending.len(),
                            delay_ms = delay.as_millis() as u64,
                            reason = state.last_reason.as_deref().unwrap_or_default(),
                            "Retrying failed records after backoff"
                        );
                    }

                    if let Err(err) = sleep_or_cancel(delay, cancel).await {
                        self.stats.record_cancelled();
                        debug!(attempt = state.attempt, "Cancelled during backoff");
                        return Err(err);
                    }
                    state.total_backoff += delay;
                    state.retried_records += state.pending.len();
                    retry_batch = Some(batch.subset(&state.pending));
                }
            }
        }
    }

    fn cancelled(&self, state: &RetryState, when: &str) -> Error {
        self.stats.record_cancelled();
        debug!(
            attempt = state.attempt,
            pending_records = state.pending.len(),
            "Put cancelled {when}"
        );
        Error::Cancelled(format!(
            "put to stream {} cancelled {when} (attempt {}, {} records undelivered)",
            self.stream,
            state.attempt,
            state.pending.len()
        ))
    }

    fn exhausted(&self, state: &RetryState) -> Error {
        self.stats.record_exhausted();
        let last_reason = state.last_reason.clone().unwrap_or_else(|| "unknown".to_string());
        error!(
            stream = %self.stream,
            attempts = state.attempt,
            failed_records = state.pending.len(),
            reason = %last_reason,
            "Failed to write records after all retry attempts"
        );
        Error::RetriesExhausted {
            stream: self.stream.clone(),
            attempts: state.attempt,
            failed_records: state.pending.len(),
            last_reason,
        }
    }
}
