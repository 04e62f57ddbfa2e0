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

//! Session-to-partition routing.
//!
//! Every record of a session must land on the same queue partition so one
//! worker replays the whole session in capture order. The mapping is a
//! stable hash of the partition key modulo the shard count; it must stay
//! identical across processes and runs for a given shard count.

use std::hash::Hasher;
use twox_hash::XxHash64;

/// Default number of queue partitions when deployment does not say otherwise.
pub const DEFAULT_SHARD_COUNT: u32 = 4;

// Fixed seed: the hash is part of the routing contract.
const PARTITION_SEED: u64 = 0;

/// Partition for an arbitrary string key.
pub fn partition_for_key(key: &str, shard_count: u32) -> u32 {
    debug_assert!(shard_count > 0, "shard count must be non-zero");
    let mut hasher = XxHash64::with_seed(PARTITION_SEED);
    hasher.write(key.as_bytes());
    (hasher.finish() % u64::from(shard_count)) as u32
}

/// Partition for a trace session id.
pub fn partition_for_session(session_id: u16, shard_count: u32) -> u32 {
    partition_for_key(&session_id.to_string(), shard_count)
}
