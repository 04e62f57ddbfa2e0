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

//! Sqlreplay Dispatch
//!
//! Partitioned queue contract and the statement dispatcher. The durable
//! production queue is an external system; this crate defines its
//! partitioning/ordering contract and provides two local implementations
//! of it (in-memory for the harness and tests, directory-backed for CLI
//! runs).

pub mod dirqueue;
pub mod dispatcher;
pub mod queue;

pub use dirqueue::DirectoryQueue;
pub use dispatcher::StatementDispatcher;
pub use queue::{InMemoryQueue, PartitionConsumer};
