// Copyright 2025 Sqlreplay Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Size/count-bounded batching.
//!
//! One algorithm serves both sides of the pipeline: statement dispatch to
//! the partitioned queue and outcome delivery to the results sink. The
//! batcher keeps a pending buffer plus a running byte total; before an
//! entry that would meet the byte budget is added, or when the record
//! budget is already full, the buffer is flushed. `finish` flushes the
//! remainder unconditionally at the end of a unit of work.

use crate::error::DeliveryError;
use tracing::debug;

/// Maximum records per delivered batch.
pub const MAX_RECORDS_PER_BATCH: usize = 500;

/// Largest payload the downstream accepts in one batch.
pub const MAX_BATCH_PAYLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Headroom for the batch envelope and per-record serialization overhead,
/// which the running byte total does not count.
pub const BATCH_SAFETY_MARGIN_BYTES: usize = 16 * 1024;

/// Count and byte budgets for one batcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPolicy {
    pub max_records: usize,
    pub max_bytes: usize,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            max_records: MAX_RECORDS_PER_BATCH,
            max_bytes: MAX_BATCH_PAYLOAD_BYTES - BATCH_SAFETY_MARGIN_BYTES,
        }
    }
}

impl BatchPolicy {
    pub fn new(max_records: usize, max_bytes: usize) -> Self {
        Self {
            max_records,
            max_bytes,
        }
    }

    /// Default byte budget with a custom record budget.
    pub fn with_max_records(max_records: usize) -> Self {
        Self {
            max_records,
            ..Self::default()
        }
    }
}

/// A serialized record awaiting delivery. Queue publication routes by the
/// partition key; result sinks ignore it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEntry {
    pub partition_key: Option<String>,
    pub payload: Vec<u8>,
}

impl BatchEntry {
    pub fn keyed(partition_key: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            partition_key: Some(partition_key.into()),
            payload,
        }
    }

    pub fn unkeyed(payload: Vec<u8>) -> Self {
        Self {
            partition_key: None,
            payload,
        }
    }
}

/// Delivery seam for flushed batches. Implemented by the partitioned queue
/// and by result sinks; implementations never retry a failed batch.
pub trait BatchTransport {
    fn send_batch(&self, entries: &[BatchEntry]) -> Result<(), DeliveryError>;
}

impl<T: BatchTransport + ?Sized> BatchTransport for &T {
    fn send_batch(&self, entries: &[BatchEntry]) -> Result<(), DeliveryError> {
        (**self).send_batch(entries)
    }
}

impl<T: BatchTransport + ?Sized> BatchTransport for std::sync::Arc<T> {
    fn send_batch(&self, entries: &[BatchEntry]) -> Result<(), DeliveryError> {
        (**self).send_batch(entries)
    }
}

/// Totals for a finished unit of work.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub batches: u64,
    pub records: u64,
}

/// Accumulates serialized records and flushes them under [`BatchPolicy`]
/// budgets.
pub struct RecordBatcher<T: BatchTransport> {
    transport: T,
    policy: BatchPolicy,
    pending: Vec<BatchEntry>,
    pending_bytes: usize,
    stats: BatchStats,
}

impl<T: BatchTransport> RecordBatcher<T> {
    pub fn new(transport: T, policy: BatchPolicy) -> Self {
        Self {
            transport,
            policy,
            pending: Vec::new(),
            pending_bytes: 0,
            stats: BatchStats::default(),
        }
    }

    /// Buffer one entry, flushing first if adding it would meet the byte
    /// budget or the buffer already holds the maximum record count.
    pub fn push(&mut self, entry: BatchEntry) -> Result<(), DeliveryError> {
        if self.pending_bytes + entry.payload.len() >= self.policy.max_bytes
            || self.pending.len() >= self.policy.max_records
        {
            self.flush()?;
        }
        self.pending_bytes += entry.payload.len();
        self.pending.push(entry);
        Ok(())
    }

    /// Deliver pending entries as one batch. No-op on an empty buffer.
    pub fn flush(&mut self) -> Result<(), DeliveryError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        self.transport.send_batch(&self.pending)?;
        debug!(
            records = self.pending.len(),
            bytes = self.pending_bytes,
            "flushed batch"
        );
        self.stats.batches += 1;
        self.stats.records += self.pending.len() as u64;
        self.pending.clear();
        self.pending_bytes = 0;
        Ok(())
    }

    /// End of the unit of work: flush whatever is buffered, unconditionally.
    pub fn finish(mut self) -> Result<BatchStats, DeliveryError> {
        self.flush()?;
        Ok(self.stats)
    }

    /// Totals flushed so far; valid mid-run for partial-progress reporting.
    pub fn stats(&self) -> BatchStats {
        self.stats
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
