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

//! Sqlreplay Replay
//!
//! Per-partition replay workers: session-affine connections, ordered
//! statement execution with result-type outcomes, and batched delivery to
//! the results sink.

pub mod connection;
pub mod engine;
pub mod outcome;
pub mod sink;
pub mod worker;

pub use connection::{
    ConnectionError, ConnectionFactory, SessionConnection, SessionPool, StatementFailure,
};
pub use engine::{NullFactory, SqliteFactory};
pub use outcome::{execute_timed, ExecutionOutcome};
pub use sink::{CollectingSink, JsonlFileSink};
pub use worker::{CancelToken, ReplayReport, ReplayWorker};
