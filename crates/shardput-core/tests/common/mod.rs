//! Shared test infrastructure for shardput-core integration tests.
//!
//! Import from integration test files with:
//! ```ignore
//! mod common;
//! use common::ScriptedSubmitter;
//! ```

#![allow(dead_code)]

use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use shardput_core::{ApiError, Batch, CancellationToken, Record, SubmitReply, Submitter};
use tokio::time::Instant;

pub const RESOURCE_NOT_FOUND: &str = "ResourceNotFoundException";
pub const THROUGHPUT_EXCEEDED: &str = "ProvisionedThroughputExceededException";

/// Submitter driven by a closure, recording every call.
pub struct ScriptedSubmitter<F> {
    op: F,
    calls: AtomicUsize,
    call_times: Mutex<Vec<Instant>>,
    submitted: Mutex<Vec<Vec<Record>>>,
}

impl<F> ScriptedSubmitter<F>
where
    F: Fn(&[Record]) -> SubmitReply + Send + Sync,
{
    pub fn new(op: F) -> Self {
        Self {
            op,
            calls: AtomicUsize::new(0),
            call_times: Mutex::new(Vec::new()),
            submitted: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.call_times.lock().unwrap().clone()
    }

    pub fn submitted(&self) -> Vec<Vec<Record>> {
        self.submitted.lock().unwrap().clone()
    }

    /// Gaps between consecutive calls.
    pub fn gaps(&self) -> Vec<Duration> {
        self.call_times()
            .windows(2)
            .map(|w| w[1].duration_since(w[0]))
            .collect()
    }
}

impl<F> Submitter for ScriptedSubmitter<F>
where
    F: Fn(&[Record]) -> SubmitReply + Send + Sync,
{
    fn submit(
        &self,
        _cancel: &CancellationToken,
        records: &[Record],
    ) -> impl Future<Output = SubmitReply> + Send {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.call_times.lock().unwrap().push(Instant::now());
        self.submitted.lock().unwrap().push(records.to_vec());
        let reply = (self.op)(records);
        async move { reply }
    }
}

/// Submitter that takes `latency` per call, honoring cancellation.
pub struct SlowSubmitter {
    pub latency: Duration,
    pub calls: AtomicUsize,
}

impl SlowSubmitter {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            calls: AtomicUsize::new(0),
        }
    }
}

impl Submitter for SlowSubmitter {
    async fn submit(&self, cancel: &CancellationToken, records: &[Record]) -> SubmitReply {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::select! {
            () = cancel.cancelled() => SubmitReply::failed(
                ApiError::new("RequestCanceled", "context canceled"),
                records.len(),
            ),
            () = tokio::time::sleep(self.latency) => SubmitReply::accepted(records.len()),
        }
    }
}

pub fn successful_op(records: &[Record]) -> SubmitReply {
    SubmitReply::accepted(records.len())
}

pub fn hard_failed_op(records: &[Record]) -> SubmitReply {
    SubmitReply::failed(
        ApiError::new(RESOURCE_NOT_FOUND, "testing incorrect stream configuration"),
        records.len(),
    )
}

pub fn throttled_op(records: &[Record]) -> SubmitReply {
    SubmitReply::failed(
        ApiError::new(THROUGHPUT_EXCEEDED, "testing throttled operation"),
        records.len(),
    )
}

/// Throttles the first `recover_after` calls, then accepts everything.
pub fn transient_op(recover_after: usize) -> impl Fn(&[Record]) -> SubmitReply + Send + Sync {
    let attempt = AtomicUsize::new(0);
    move |records: &[Record]| {
        if attempt.fetch_add(1, Ordering::SeqCst) < recover_after {
            throttled_op(records)
        } else {
            successful_op(records)
        }
    }
}

/// Batch of `n` records with payloads encoding their index.
pub fn numbered_batch(n: usize) -> Batch {
    let mut batch = Batch::with_capacity(n);
    for i in 0..n {
        batch
            .push((i as u32).to_le_bytes().to_vec(), "fixed-key")
            .unwrap();
    }
    batch
}

/// Index encoded by [`numbered_batch`].
pub fn record_id(record: &Record) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&record.payload()[..4]);
    u32::from_le_bytes(bytes)
}
