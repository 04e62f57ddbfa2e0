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

//! Statement dispatcher: serializes records, keys them by session and
//! feeds the shared batcher toward the partitioned queue.

use sqlreplay_core::{
    BatchEntry, BatchPolicy, BatchStats, BatchTransport, DeliveryError, RecordBatcher,
    StatementRecord,
};
use tracing::info;

pub struct StatementDispatcher<T: BatchTransport> {
    batcher: RecordBatcher<T>,
}

impl<T: BatchTransport> StatementDispatcher<T> {
    pub fn new(queue: T, policy: BatchPolicy) -> Self {
        Self {
            batcher: RecordBatcher::new(queue, policy),
        }
    }

    /// Publish one record, keyed by its session.
    pub fn dispatch(&mut self, record: &StatementRecord) -> Result<(), DeliveryError> {
        let payload = serde_json::to_vec(record)
            .map_err(|err| DeliveryError::new(1, format!("record serialization: {err}")))?;
        self.batcher
            .push(BatchEntry::keyed(record.partition_key(), payload))
    }

    /// Batches flushed so far; valid mid-run for partial-progress reports.
    pub fn stats(&self) -> BatchStats {
        self.batcher.stats()
    }

    /// End of the extraction run: flush the remainder unconditionally.
    pub fn finish(self) -> Result<BatchStats, DeliveryError> {
        let stats = self.batcher.finish()?;
        info!(
            batches = stats.batches,
            records = stats.records,
            "dispatch complete"
        );
        Ok(stats)
    }
}
