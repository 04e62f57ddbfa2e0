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

//! Sqlreplay Core
//!
//! Shared records, partitioning, batching policy and configuration for the
//! workload-replay pipeline.

pub mod batch;
pub mod config;
pub mod error;
pub mod partition;
pub mod record;

pub use batch::{
    BatchEntry, BatchPolicy, BatchStats, BatchTransport, RecordBatcher,
    BATCH_SAFETY_MARGIN_BYTES, MAX_BATCH_PAYLOAD_BYTES, MAX_RECORDS_PER_BATCH,
};
pub use config::{DispatchConfig, TargetConfig};
pub use error::DeliveryError;
pub use partition::{partition_for_key, partition_for_session, DEFAULT_SHARD_COUNT};
pub use record::{StatementOutcomeRecord, StatementRecord};
