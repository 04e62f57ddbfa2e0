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

//! Trace-source error taxonomy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TraceError {
    /// The trace source is structurally invalid or truncated. Extraction
    /// aborts; records already dispatched remain valid.
    #[error("trace format error: {0}")]
    TraceFormat(String),

    /// The trace source cannot be read at all. Extraction aborts before
    /// producing any records.
    #[error("trace source unavailable: {0}")]
    SourceUnavailable(#[from] std::io::Error),
}

impl TraceError {
    pub fn format(message: impl Into<String>) -> Self {
        Self::TraceFormat(message.into())
    }
}
