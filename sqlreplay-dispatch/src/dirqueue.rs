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

//! Directory-backed queue for local CLI runs.
//!
//! One append-only JSONL file per partition; append order is arrival
//! order, which is all the replay side needs. Payloads are compact JSON
//! and therefore never contain a raw newline. This is the local stand-in
//! for the external durable queue, not a reimplementation of it.

use parking_lot::Mutex;
use sqlreplay_core::{partition_for_key, BatchEntry, BatchTransport, DeliveryError};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::queue::PartitionConsumer;

pub struct DirectoryQueue {
    dir: PathBuf,
    shard_count: u32,
    // Serializes appends so concurrent flushes cannot interleave lines.
    write_lock: Mutex<()>,
    // Per-partition read offsets for take_batch.
    read_offsets: Mutex<Vec<usize>>,
}

impl DirectoryQueue {
    /// Open (creating if needed) a queue directory.
    pub fn create(dir: impl AsRef<Path>, shard_count: u32) -> std::io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            shard_count,
            write_lock: Mutex::new(()),
            read_offsets: Mutex::new(vec![0; shard_count as usize]),
        })
    }

    pub fn shard_count(&self) -> u32 {
        self.shard_count
    }

    pub fn partition_path(&self, partition: u32) -> PathBuf {
        self.dir.join(format!("partition-{partition:04}.jsonl"))
    }

    /// Every payload of one partition, in arrival order. Missing file
    /// means nothing was ever published there.
    pub fn read_partition(&self, partition: u32) -> Result<Vec<Vec<u8>>, DeliveryError> {
        let path = self.partition_path(partition);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&path).map_err(|err| DeliveryError::from_io(0, err))?;
        let mut payloads = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|err| DeliveryError::from_io(0, err))?;
            if !line.is_empty() {
                payloads.push(line.into_bytes());
            }
        }
        Ok(payloads)
    }
}

impl BatchTransport for DirectoryQueue {
    fn send_batch(&self, entries: &[BatchEntry]) -> Result<(), DeliveryError> {
        let map_err = |err| DeliveryError::from_io(entries.len(), err);
        let _guard = self.write_lock.lock();
        // Open each touched partition file once per flush.
        let mut open: Vec<Option<File>> = (0..self.shard_count).map(|_| None).collect();
        for entry in entries {
            let key = entry.partition_key.as_deref().ok_or_else(|| {
                DeliveryError::new(entries.len(), "queue entry without partition key")
            })?;
            let partition = partition_for_key(key, self.shard_count) as usize;
            if open[partition].is_none() {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(self.partition_path(partition as u32))
                    .map_err(map_err)?;
                open[partition] = Some(file);
            }
            let file = open[partition].as_mut().unwrap();
            file.write_all(&entry.payload).map_err(map_err)?;
            file.write_all(b"\n").map_err(map_err)?;
        }
        for file in open.into_iter().flatten() {
            file.sync_data().map_err(map_err)?;
        }
        Ok(())
    }
}

impl PartitionConsumer for DirectoryQueue {
    fn take_batch(&self, partition: u32, max: usize) -> Result<Vec<Vec<u8>>, DeliveryError> {
        if partition >= self.shard_count {
            return Err(DeliveryError::new(0, format!("unknown partition {partition}")));
        }
        let all = self.read_partition(partition)?;
        let mut offsets = self.read_offsets.lock();
        let offset = &mut offsets[partition as usize];
        let end = (*offset + max).min(all.len());
        let batch = all[*offset..end].to_vec();
        *offset = end;
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn published_payloads_come_back_in_arrival_order() {
        let dir = tempdir().unwrap();
        let queue = DirectoryQueue::create(dir.path(), 2).unwrap();

        queue
            .send_batch(&[
                BatchEntry::keyed("5", b"one".to_vec()),
                BatchEntry::keyed("5", b"two".to_vec()),
            ])
            .unwrap();
        queue
            .send_batch(&[BatchEntry::keyed("5", b"three".to_vec())])
            .unwrap();

        let partition = partition_for_key("5", 2);
        let payloads = queue.read_partition(partition).unwrap();
        assert_eq!(
            payloads,
            vec![b"one".to_vec(), b"two".to_vec(), b"three".to_vec()]
        );

        let other = queue.read_partition(1 - partition).unwrap();
        assert!(other.is_empty());
    }

    #[test]
    fn take_batch_advances_through_the_partition() {
        let dir = tempdir().unwrap();
        let queue = DirectoryQueue::create(dir.path(), 1).unwrap();
        queue
            .send_batch(&[
                BatchEntry::keyed("1", b"a".to_vec()),
                BatchEntry::keyed("1", b"b".to_vec()),
                BatchEntry::keyed("1", b"c".to_vec()),
            ])
            .unwrap();

        assert_eq!(queue.take_batch(0, 2).unwrap().len(), 2);
        assert_eq!(queue.take_batch(0, 2).unwrap(), vec![b"c".to_vec()]);
        assert!(queue.take_batch(0, 2).unwrap().is_empty());
    }
}
