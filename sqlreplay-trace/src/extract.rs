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

//! Statement extraction.
//!
//! Lazily walks a trace event source and yields one [`StatementRecord`]
//! per replayable event. Per-event malformation (missing text or session
//! id) skips that event; a source-level error ends the run.
//!
//! Filtering, in order:
//! 1. only completed batch / completed RPC events are considered;
//! 2. `sp_reset_connection` housekeeping calls are skipped;
//! 3. text comes from the `statement` field, else `batch_text`; empty
//!    text skips the event;
//! 4. events without a `session_id` action are skipped;
//! 5. once `limit` records have been emitted, the run ends.

use crate::error::TraceError;
use crate::event::{
    EventView, TraceEvent, TraceValue, BATCH_TEXT_FIELD, CONNECTION_RESET_PROC, OBJECT_NAME_FIELD,
    SESSION_ID_ACTION, STATEMENT_FIELD,
};
use crate::normalize::StatementNormalizer;
use sqlreplay_core::StatementRecord;
use tracing::{debug, trace};
use uuid::Uuid;

/// Emitted/skipped counters for one extraction run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractStats {
    pub emitted: u64,
    pub skipped: u64,
}

/// Lazy, finite, non-restartable extractor over a trace event source.
pub struct StatementExtractor<S> {
    source: S,
    normalizer: StatementNormalizer,
    testset_id: Uuid,
    limit: Option<u64>,
    stats: ExtractStats,
    done: bool,
}

impl<S> StatementExtractor<S>
where
    S: Iterator<Item = Result<TraceEvent, TraceError>>,
{
    /// All records of this run share one freshly generated testset id.
    pub fn new(source: S, limit: Option<u64>) -> Self {
        let testset_id = Uuid::new_v4();
        debug!(%testset_id, ?limit, "starting extraction run");
        Self {
            source,
            normalizer: StatementNormalizer::new(),
            testset_id,
            limit,
            stats: ExtractStats::default(),
            done: false,
        }
    }

    pub fn testset_id(&self) -> Uuid {
        self.testset_id
    }

    pub fn stats(&self) -> ExtractStats {
        self.stats
    }

    /// Session id and normalized text for a replayable event, or `None`
    /// when the event is filtered out.
    fn accept(&self, event: &TraceEvent) -> Option<(u16, String)> {
        if !event.class.is_completed_execution() {
            return None;
        }
        if let Some(name) = event
            .try_get_field(OBJECT_NAME_FIELD)
            .and_then(TraceValue::as_text)
        {
            if name.eq_ignore_ascii_case(CONNECTION_RESET_PROC) {
                trace!("skipping connection-reset call");
                return None;
            }
        }
        let text = event
            .try_get_field(STATEMENT_FIELD)
            .and_then(TraceValue::as_text)
            .filter(|t| !t.is_empty())
            .or_else(|| {
                event
                    .try_get_field(BATCH_TEXT_FIELD)
                    .and_then(TraceValue::as_text)
                    .filter(|t| !t.is_empty())
            })?;
        let session_id = event
            .try_get_action(SESSION_ID_ACTION)
            .and_then(TraceValue::as_uint)
            .and_then(|id| u16::try_from(id).ok())?;

        Some((session_id, self.normalizer.normalize(text)))
    }
}

impl<S> Iterator for StatementExtractor<S>
where
    S: Iterator<Item = Result<TraceEvent, TraceError>>,
{
    type Item = Result<StatementRecord, TraceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if let Some(limit) = self.limit {
            if self.stats.emitted >= limit {
                debug!(limit, "extraction limit reached");
                self.done = true;
                return None;
            }
        }
        loop {
            let event = match self.source.next() {
                None => {
                    self.done = true;
                    return None;
                }
                Some(Err(err)) => {
                    self.done = true;
                    return Some(Err(err));
                }
                Some(Ok(event)) => event,
            };
            match self.accept(&event) {
                Some((session_id, statement)) => {
                    self.stats.emitted += 1;
                    return Some(Ok(StatementRecord::new(
                        self.testset_id,
                        session_id,
                        statement,
                    )));
                }
                None => self.stats.skipped += 1,
            }
        }
    }
}
