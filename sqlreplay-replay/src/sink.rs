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

//! Result sinks.
//!
//! The production sink is an external storage/indexing system; these
//! implementations cover local runs and tests behind the same
//! [`BatchTransport`] seam the dispatcher uses.

use parking_lot::Mutex;
use sqlreplay_core::{BatchEntry, BatchTransport, DeliveryError};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Appends one JSON outcome per line; each flushed batch is one
/// contiguous run of lines.
pub struct JsonlFileSink {
    file: Mutex<BufWriter<File>>,
}

impl JsonlFileSink {
    pub fn create(path: impl AsRef<Path>) -> std::io::Result<Self> {
        Ok(Self {
            file: Mutex::new(BufWriter::new(File::create(path)?)),
        })
    }
}

impl BatchTransport for JsonlFileSink {
    fn send_batch(&self, entries: &[BatchEntry]) -> Result<(), DeliveryError> {
        let map_err = |err| DeliveryError::from_io(entries.len(), err);
        let mut file = self.file.lock();
        for entry in entries {
            file.write_all(&entry.payload).map_err(map_err)?;
            file.write_all(b"\n").map_err(map_err)?;
        }
        file.flush().map_err(map_err)
    }
}

/// Retains every delivered batch; test and harness sink.
#[derive(Default)]
pub struct CollectingSink {
    batches: Mutex<Vec<Vec<Vec<u8>>>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().iter().map(|batch| batch.len()).collect()
    }

    /// All delivered payloads, flattened in delivery order.
    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.batches.lock().iter().flatten().cloned().collect()
    }
}

impl BatchTransport for CollectingSink {
    fn send_batch(&self, entries: &[BatchEntry]) -> Result<(), DeliveryError> {
        self.batches
            .lock()
            .push(entries.iter().map(|entry| entry.payload.clone()).collect());
        Ok(())
    }
}
