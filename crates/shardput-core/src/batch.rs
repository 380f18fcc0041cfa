//! Ordered record container handed to the batcher.
//!
//! Records are validated against the ingestion service's per-record limits
//! when added, so a batch that reaches [`crate::Batcher::put`] only fails for
//! delivery reasons.

use serde::Serialize;

use crate::error::{Error, Result};

/// Maximum combined size of payload and partition key for one record (1 MiB).
pub const MAX_RECORD_BYTES: usize = 1024 * 1024;

/// Maximum partition key length in bytes.
pub const MAX_PARTITION_KEY_BYTES: usize = 256;

/// One serialized record plus the key that routes it to a shard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    payload: Vec<u8>,
    partition_key: String,
}

impl Record {
    /// Build a record, enforcing the service limits.
    pub fn new(payload: impl Into<Vec<u8>>, partition_key: impl Into<String>) -> Result<Self> {
        let payload = payload.into();
        let partition_key = partition_key.into();

        if partition_key.is_empty() {
            return Err(Error::InvalidRecord("partition key must not be empty".to_string()));
        }
        if partition_key.len() > MAX_PARTITION_KEY_BYTES {
            return Err(Error::InvalidRecord(format!(
                "partition key is {} bytes, max {MAX_PARTITION_KEY_BYTES}",
                partition_key.len()
            )));
        }
        let size = payload.len() + partition_key.len();
        if size > MAX_RECORD_BYTES {
            return Err(Error::InvalidRecord(format!(
                "record is {size} bytes, max {MAX_RECORD_BYTES}"
            )));
        }

        Ok(Self {
            payload,
            partition_key,
        })
    }

    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    #[must_use]
    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }

    /// Payload plus key, the size the service bills against.
    #[must_use]
    pub fn size(&self) -> usize {
        self.payload.len() + self.partition_key.len()
    }
}

/// Ordered sequence of records, insertion order preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    records: Vec<Record>,
}

impl Batch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
        }
    }

    /// Append a raw payload.
    pub fn push(
        &mut self,
        payload: impl Into<Vec<u8>>,
        partition_key: impl Into<String>,
    ) -> Result<()> {
        self.records.push(Record::new(payload, partition_key)?);
        Ok(())
    }

    /// Serialize `value` as JSON and append it.
    pub fn push_json<T: Serialize + ?Sized>(
        &mut self,
        value: &T,
        partition_key: impl Into<String>,
    ) -> Result<()> {
        let payload = serde_json::to_vec(value)
            .map_err(|e| Error::InvalidRecord(format!("failed to encode record: {e}")))?;
        self.push(payload, partition_key)
    }

    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Total billed bytes across every record.
    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.records.iter().map(Record::size).sum()
    }

    /// Reduced batch holding the records at `indices`, in the order given.
    ///
    /// Out-of-range indices are skipped.
    #[must_use]
    pub fn subset(&self, indices: &[usize]) -> Self {
        indices
            .iter()
            .filter_map(|&i| self.records.get(i).cloned())
            .collect()
    }
}

impl FromIterator<Record> for Batch {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Batch {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
