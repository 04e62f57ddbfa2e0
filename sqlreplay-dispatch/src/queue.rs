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

//! Partitioned queue contract.
//!
//! Publication routes every entry to `partition(key, shard_count)`;
//! within a partition the queue preserves arrival order. A session's
//! records all share one key, so they land on one partition and replay
//! in capture order even when the partition multiplexes many sessions.

use parking_lot::Mutex;
use sqlreplay_core::{partition_for_key, BatchEntry, BatchTransport, DeliveryError};
use std::collections::VecDeque;

/// Consumption side of the queue: ordered payloads per partition.
pub trait PartitionConsumer {
    /// Up to `max` payloads from one partition, in arrival order. An empty
    /// result means the partition is drained.
    fn take_batch(&self, partition: u32, max: usize) -> Result<Vec<Vec<u8>>, DeliveryError>;
}

/// In-memory partitioned queue for the local harness and tests. The
/// production queue is an external durable system with the same contract.
pub struct InMemoryQueue {
    shards: Vec<Mutex<VecDeque<Vec<u8>>>>,
}

impl InMemoryQueue {
    pub fn new(shard_count: u32) -> Self {
        Self {
            shards: (0..shard_count).map(|_| Mutex::new(VecDeque::new())).collect(),
        }
    }

    pub fn shard_count(&self) -> u32 {
        self.shards.len() as u32
    }

    pub fn partition_len(&self, partition: u32) -> usize {
        self.shards
            .get(partition as usize)
            .map(|shard| shard.lock().len())
            .unwrap_or(0)
    }
}

impl BatchTransport for InMemoryQueue {
    fn send_batch(&self, entries: &[BatchEntry]) -> Result<(), DeliveryError> {
        // Reject the whole batch up front; partial publication would break
        // the all-or-nothing retry contract.
        if entries.iter().any(|entry| entry.partition_key.is_none()) {
            return Err(DeliveryError::new(
                entries.len(),
                "queue entry without partition key",
            ));
        }
        for entry in entries {
            let key = entry.partition_key.as_deref().unwrap_or_default();
            let partition = partition_for_key(key, self.shard_count());
            self.shards[partition as usize]
                .lock()
                .push_back(entry.payload.clone());
        }
        Ok(())
    }
}

impl PartitionConsumer for InMemoryQueue {
    fn take_batch(&self, partition: u32, max: usize) -> Result<Vec<Vec<u8>>, DeliveryError> {
        let shard = self.shards.get(partition as usize).ok_or_else(|| {
            DeliveryError::new(0, format!("unknown partition {partition}"))
        })?;
        let mut shard = shard.lock();
        let take = max.min(shard.len());
        Ok(shard.drain(..take).collect())
    }
}
