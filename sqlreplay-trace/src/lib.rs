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

//! Sqlreplay Trace
//!
//! Session-trace event model, binary codec and the statement extractor:
//! turns a captured trace byte stream into a lazy sequence of normalized
//! [`sqlreplay_core::StatementRecord`]s.

pub mod codec;
pub mod error;
pub mod event;
pub mod extract;
pub mod normalize;

pub use codec::{TraceReader, TraceWriter, TRACE_FORMAT_VERSION};
pub use error::TraceError;
pub use event::{
    EventClass, EventView, TraceEvent, TraceValue, BATCH_TEXT_FIELD, CONNECTION_RESET_PROC,
    OBJECT_NAME_FIELD, SESSION_ID_ACTION, STATEMENT_FIELD,
};
pub use extract::{ExtractStats, StatementExtractor};
pub use normalize::StatementNormalizer;
