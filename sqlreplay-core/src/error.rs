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

//! Delivery error type shared by queue and sink transports.

use thiserror::Error;

/// A batch flush was rejected by the queue or sink. The caller decides
/// whether to retry the whole batch or abort; transports never retry on
/// their own and never drop a batch silently.
#[derive(Debug, Clone, Error)]
#[error("batch delivery failed ({records} records): {reason}")]
pub struct DeliveryError {
    /// Number of records in the rejected batch.
    pub records: usize,
    pub reason: String,
}

impl DeliveryError {
    pub fn new(records: usize, reason: impl Into<String>) -> Self {
        Self {
            records,
            reason: reason.into(),
        }
    }

    pub fn from_io(records: usize, err: std::io::Error) -> Self {
        Self::new(records, err.to_string())
    }
}
