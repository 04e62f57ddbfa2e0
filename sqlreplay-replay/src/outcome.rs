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

//! Result-type statement execution.
//!
//! Statement-level failure is a value, not an unwind path: execution
//! returns [`ExecutionOutcome`] and hard faults (connections that cannot
//! be established) travel on the separate `ConnectionError` channel.

use crate::connection::SessionConnection;
use chrono::{DateTime, Utc};
use sqlreplay_core::{StatementOutcomeRecord, StatementRecord};
use std::time::Instant;

#[derive(Debug, Clone)]
pub enum ExecutionOutcome {
    Success {
        duration_ms: u64,
        execution_time: DateTime<Utc>,
    },
    Failure {
        duration_ms: u64,
        execution_time: DateTime<Utc>,
        message: String,
    },
}

impl ExecutionOutcome {
    /// Join the outcome back to the record it came from, 1:1.
    pub fn into_record(
        self,
        record: StatementRecord,
        engine_tag: &str,
    ) -> StatementOutcomeRecord {
        match self {
            ExecutionOutcome::Success {
                duration_ms,
                execution_time,
            } => StatementOutcomeRecord::success(record, duration_ms, execution_time, engine_tag),
            ExecutionOutcome::Failure {
                duration_ms,
                execution_time,
                message,
            } => StatementOutcomeRecord::failure(
                record,
                duration_ms,
                execution_time,
                message,
                engine_tag,
            ),
        }
    }
}

/// Execute one statement on an open session connection, timing only the
/// execution itself (connection setup is never included).
pub fn execute_timed(conn: &mut dyn SessionConnection, statement: &str) -> ExecutionOutcome {
    let execution_time = Utc::now();
    let started = Instant::now();
    match conn.execute(statement) {
        Ok(()) => ExecutionOutcome::Success {
            duration_ms: started.elapsed().as_millis() as u64,
            execution_time,
        },
        Err(failure) => ExecutionOutcome::Failure {
            duration_ms: started.elapsed().as_millis() as u64,
            execution_time,
            message: failure.0,
        },
    }
}
