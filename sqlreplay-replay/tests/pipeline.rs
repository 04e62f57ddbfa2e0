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

//! Dispatch -> queue -> replay -> sink, end to end.

use sqlreplay_core::{BatchPolicy, StatementOutcomeRecord, StatementRecord};
use sqlreplay_dispatch::{InMemoryQueue, PartitionConsumer, StatementDispatcher};
use sqlreplay_replay::{CollectingSink, NullFactory, ReplayWorker};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

fn drain_partition(queue: &InMemoryQueue, partition: u32) -> Vec<StatementRecord> {
    let mut records = Vec::new();
    loop {
        let payloads = queue.take_batch(partition, 500).unwrap();
        if payloads.is_empty() {
            break;
        }
        for payload in payloads {
            records.push(serde_json::from_slice(&payload).unwrap());
        }
    }
    records
}

fn decode_outcomes(sink: &CollectingSink) -> Vec<StatementOutcomeRecord> {
    sink.payloads()
        .iter()
        .map(|p| serde_json::from_slice(p).unwrap())
        .collect()
}

#[test]
fn twelve_hundred_records_make_three_dispatch_and_three_result_batches() {
    let queue = Arc::new(InMemoryQueue::new(1));
    let mut dispatcher =
        StatementDispatcher::new(queue.clone(), BatchPolicy::with_max_records(500));

    let testset = Uuid::new_v4();
    for i in 0..1200u32 {
        let session = (i % 4 + 1) as u16;
        let record = StatementRecord::new(testset, session, format!("stmt-{i}"));
        dispatcher.dispatch(&record).unwrap();
    }
    let dispatch_stats = dispatcher.finish().unwrap();
    assert_eq!(dispatch_stats.batches, 3);
    assert_eq!(dispatch_stats.records, 1200);

    let input = drain_partition(&queue, 0);
    assert_eq!(input.len(), 1200);

    let sink = Arc::new(CollectingSink::new());
    let worker = ReplayWorker::new(
        0,
        NullFactory::new(),
        sink.clone(),
        BatchPolicy::with_max_records(500),
    );
    let report = worker.run(input).unwrap();

    assert_eq!(report.processed, 1200);
    assert_eq!(report.succeeded, 1200);
    assert_eq!(report.batches_flushed, 3);
    assert_eq!(sink.batch_sizes(), vec![500, 500, 200]);

    // Per-session capture order survives the whole pipeline.
    let outcomes = decode_outcomes(&sink);
    for session in 1u16..=4 {
        let indices: Vec<u32> = outcomes
            .iter()
            .filter(|o| o.session_id == session)
            .map(|o| o.statement.strip_prefix("stmt-").unwrap().parse().unwrap())
            .collect();
        let mut sorted = indices.clone();
        sorted.sort_unstable();
        assert_eq!(indices, sorted, "session {session} replayed out of order");
        assert_eq!(indices.len(), 300);
    }
}

#[test]
fn partitions_replay_concurrently_without_splitting_sessions() {
    let shard_count = 4;
    let queue = Arc::new(InMemoryQueue::new(shard_count));
    let mut dispatcher = StatementDispatcher::new(queue.clone(), BatchPolicy::default());

    let testset = Uuid::new_v4();
    for turn in 0..40u32 {
        for session in 1u16..=8 {
            let record =
                StatementRecord::new(testset, session, format!("s{session}-t{turn}"));
            dispatcher.dispatch(&record).unwrap();
        }
    }
    dispatcher.finish().unwrap();

    // One worker thread per partition, each with its own sink and pool.
    let sinks: Vec<Arc<CollectingSink>> = (0..shard_count)
        .map(|_| Arc::new(CollectingSink::new()))
        .collect();
    std::thread::scope(|scope| {
        for partition in 0..shard_count {
            let queue = queue.clone();
            let sink = sinks[partition as usize].clone();
            scope.spawn(move || {
                let input = drain_partition(&queue, partition);
                let worker =
                    ReplayWorker::new(partition, NullFactory::new(), sink, BatchPolicy::default());
                worker.run(input).unwrap();
            });
        }
    });

    // Every session lives on exactly one partition, in order.
    let mut session_home: HashMap<u16, u32> = HashMap::new();
    let mut total = 0usize;
    for (partition, sink) in sinks.iter().enumerate() {
        let mut last_turn: HashMap<u16, i64> = HashMap::new();
        for outcome in decode_outcomes(sink) {
            total += 1;
            let home = session_home
                .entry(outcome.session_id)
                .or_insert(partition as u32);
            assert_eq!(
                *home, partition as u32,
                "session {} spans partitions",
                outcome.session_id
            );
            let turn: i64 = outcome
                .statement
                .split("-t")
                .nth(1)
                .unwrap()
                .parse()
                .unwrap();
            let last = last_turn.entry(outcome.session_id).or_insert(-1);
            assert!(turn > *last, "session {} reordered", outcome.session_id);
            *last = turn;
        }
    }
    assert_eq!(total, 320);
    assert_eq!(session_home.len(), 8);
}
