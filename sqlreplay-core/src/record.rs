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

//! Statement and outcome records.
//!
//! These are the wire payloads of the pipeline: the extractor publishes
//! `StatementRecord`s to the partitioned queue, the replay worker converts
//! each one 1:1 into a `StatementOutcomeRecord` bound for the results sink.
//! JSON keys are camelCase; the queue and sink consumers depend on them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One captured unit of work from a session trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementRecord {
    /// Groups all statements captured by one extraction run.
    pub testset_id: Uuid,
    /// Globally unique, generated at extraction time.
    pub statement_id: Uuid,
    /// Original session identifier from the trace; partition/affinity key.
    pub session_id: u16,
    /// Normalized SQL text. Events without usable text never become records.
    pub statement: String,
}

impl StatementRecord {
    pub fn new(testset_id: Uuid, session_id: u16, statement: impl Into<String>) -> Self {
        Self {
            testset_id,
            statement_id: Uuid::new_v4(),
            session_id,
            statement: statement.into(),
        }
    }

    /// Queue partition key. All records of a session share it, which keeps
    /// the session on one partition and therefore on one worker.
    pub fn partition_key(&self) -> String {
        self.session_id.to_string()
    }
}

/// Replay result for one statement. Identity fields are copied from the
/// input record so the sink can join outcomes back to the capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementOutcomeRecord {
    pub testset_id: Uuid,
    pub statement_id: Uuid,
    pub session_id: u16,
    pub statement: String,
    pub success: bool,
    /// Driver error text; present iff `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Wall-clock execution time of the statement alone.
    pub duration_ms: u64,
    /// Stamped immediately before execution.
    pub execution_time: DateTime<Utc>,
    /// Which target engine/variant executed the statement.
    pub engine_tag: String,
}

impl StatementOutcomeRecord {
    pub fn success(
        record: StatementRecord,
        duration_ms: u64,
        execution_time: DateTime<Utc>,
        engine_tag: impl Into<String>,
    ) -> Self {
        Self {
            testset_id: record.testset_id,
            statement_id: record.statement_id,
            session_id: record.session_id,
            statement: record.statement,
            success: true,
            error_message: None,
            duration_ms,
            execution_time,
            engine_tag: engine_tag.into(),
        }
    }

    pub fn failure(
        record: StatementRecord,
        duration_ms: u64,
        execution_time: DateTime<Utc>,
        error_message: impl Into<String>,
        engine_tag: impl Into<String>,
    ) -> Self {
        Self {
            testset_id: record.testset_id,
            statement_id: record.statement_id,
            session_id: record.session_id,
            statement: record.statement,
            success: false,
            error_message: Some(error_message.into()),
            duration_ms,
            execution_time,
            engine_tag: engine_tag.into(),
        }
    }
}
