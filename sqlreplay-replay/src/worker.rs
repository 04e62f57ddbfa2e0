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

//! Per-partition replay worker.
//!
//! Consumes one ordered partition of statement records, replays each on
//! its session-affine connection and streams outcomes through the shared
//! batcher to the results sink. Statement failures are recorded outcomes,
//! never worker faults. At end of partition (or on cancellation between
//! records) every session connection is closed and buffered outcomes are
//! flushed.

use crate::connection::{ConnectionFactory, SessionPool};
use crate::outcome::execute_timed;
use chrono::Utc;
use sqlreplay_core::{
    BatchEntry, BatchPolicy, BatchTransport, DeliveryError, RecordBatcher, StatementOutcomeRecord,
    StatementRecord,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Cooperative cancellation flag; honored between records, never
/// mid-statement.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Counts for one processing pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayReport {
    pub partition: u32,
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub batches_flushed: u64,
    pub cancelled: bool,
}

pub struct ReplayWorker<F: ConnectionFactory, T: BatchTransport> {
    partition: u32,
    engine_tag: String,
    pool: SessionPool<F>,
    batcher: RecordBatcher<T>,
    cancel: CancelToken,
}

impl<F: ConnectionFactory, T: BatchTransport> ReplayWorker<F, T> {
    pub fn new(partition: u32, factory: F, sink: T, policy: BatchPolicy) -> Self {
        Self::with_cancel(partition, factory, sink, policy, CancelToken::new())
    }

    pub fn with_cancel(
        partition: u32,
        factory: F,
        sink: T,
        policy: BatchPolicy,
        cancel: CancelToken,
    ) -> Self {
        Self {
            partition,
            engine_tag: factory.engine_tag().to_string(),
            pool: SessionPool::new(factory),
            batcher: RecordBatcher::new(sink, policy),
            cancel,
        }
    }

    /// Replay one record on its session connection. A connection that
    /// cannot be opened yields a failed outcome for this statement (and,
    /// via the poisoned slot, for the rest of its session) rather than
    /// aborting the partition.
    fn replay_one(&mut self, record: StatementRecord) -> StatementOutcomeRecord {
        match self.pool.connection(record.session_id) {
            Ok(conn) => {
                let outcome = execute_timed(conn, &record.statement);
                outcome.into_record(record, &self.engine_tag)
            }
            Err(err) => StatementOutcomeRecord::failure(
                record,
                0,
                Utc::now(),
                err.to_string(),
                &self.engine_tag,
            ),
        }
    }

    /// Process the partition strictly in input order, one outcome per
    /// record. Returns the report, or the delivery error that ended the
    /// pass (connections are closed either way).
    pub fn run<I>(mut self, records: I) -> Result<ReplayReport, DeliveryError>
    where
        I: IntoIterator<Item = StatementRecord>,
    {
        let mut report = ReplayReport {
            partition: self.partition,
            ..ReplayReport::default()
        };
        let mut delivery_failure: Option<DeliveryError> = None;

        for record in records {
            if self.cancel.is_cancelled() {
                info!(partition = self.partition, "replay cancelled between records");
                report.cancelled = true;
                break;
            }
            let outcome = self.replay_one(record);
            report.processed += 1;
            if outcome.success {
                report.succeeded += 1;
            } else {
                report.failed += 1;
            }
            let payload = match serde_json::to_vec(&outcome) {
                Ok(payload) => payload,
                Err(err) => {
                    delivery_failure =
                        Some(DeliveryError::new(1, format!("outcome serialization: {err}")));
                    break;
                }
            };
            if let Err(err) = self.batcher.push(BatchEntry::unkeyed(payload)) {
                delivery_failure = Some(err);
                break;
            }
        }

        // End-of-partition drain. Past this point no statement may reach a
        // connection.
        self.pool.close_all();

        if let Some(err) = delivery_failure {
            let stats = self.batcher.stats();
            warn!(
                partition = self.partition,
                processed = report.processed,
                flushed_batches = stats.batches,
                flushed_records = stats.records,
                error = %err,
                "replay aborted after partial progress"
            );
            return Err(err);
        }

        if report.cancelled {
            // Best-effort flush of buffered outcomes before termination.
            if let Err(err) = self.batcher.flush() {
                warn!(
                    partition = self.partition,
                    error = %err,
                    "flush after cancellation failed"
                );
            }
            report.batches_flushed = self.batcher.stats().batches;
            return Ok(report);
        }

        self.batcher.flush()?;
        let stats = self.batcher.stats();
        report.batches_flushed = stats.batches;
        info!(
            partition = self.partition,
            processed = report.processed,
            succeeded = report.succeeded,
            failed = report.failed,
            batches = stats.batches,
            "partition replay complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{ConnectionError, SessionConnection, StatementFailure};
    use crate::sink::CollectingSink;
    use parking_lot::Mutex;
    use uuid::Uuid;

    /// Records executions; statements containing "FAIL" fail, sessions in
    /// `refuse_open` cannot connect.
    #[derive(Default)]
    struct ScriptedFactory {
        log: Arc<Mutex<Vec<(u16, String)>>>,
        opens: Arc<Mutex<Vec<u16>>>,
        refuse_open: Vec<u16>,
    }

    struct ScriptedConnection {
        session_id: u16,
        log: Arc<Mutex<Vec<(u16, String)>>>,
    }

    impl SessionConnection for ScriptedConnection {
        fn execute(&mut self, statement: &str) -> Result<(), StatementFailure> {
            self.log.lock().push((self.session_id, statement.to_string()));
            if statement.contains("FAIL") {
                Err(StatementFailure("deadlock victim".into()))
            } else {
                Ok(())
            }
        }
    }

    impl ConnectionFactory for ScriptedFactory {
        fn connect(&self, session_id: u16) -> Result<Box<dyn SessionConnection>, ConnectionError> {
            self.opens.lock().push(session_id);
            if self.refuse_open.contains(&session_id) {
                return Err(ConnectionError::new(session_id, "host unreachable"));
            }
            Ok(Box::new(ScriptedConnection {
                session_id,
                log: self.log.clone(),
            }))
        }

        fn engine_tag(&self) -> &str {
            "scripted"
        }
    }

    fn records(specs: &[(u16, &str)]) -> Vec<StatementRecord> {
        let testset = Uuid::new_v4();
        specs
            .iter()
            .map(|(session, text)| StatementRecord::new(testset, *session, *text))
            .collect()
    }

    fn decode(payloads: Vec<Vec<u8>>) -> Vec<StatementOutcomeRecord> {
        payloads
            .iter()
            .map(|p| serde_json::from_slice(p).unwrap())
            .collect()
    }

    #[test]
    fn statement_failure_is_isolated_and_connection_stays_usable() {
        let factory = ScriptedFactory::default();
        let opens = factory.opens.clone();
        let sink = Arc::new(CollectingSink::new());
        let worker = ReplayWorker::new(0, factory, sink.clone(), BatchPolicy::default());

        let report = worker
            .run(records(&[(1, "SELECT 1"), (1, "FAIL ME"), (1, "SELECT 3")]))
            .unwrap();

        assert_eq!(report.processed, 3);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);

        let outcomes = decode(sink.payloads());
        assert_eq!(
            outcomes.iter().map(|o| o.success).collect::<Vec<_>>(),
            vec![true, false, true]
        );
        assert_eq!(outcomes[1].error_message.as_deref(), Some("deadlock victim"));
        // One connection served all three statements.
        assert_eq!(*opens.lock(), vec![1]);
    }

    #[test]
    fn outcomes_preserve_input_order_across_interleaved_sessions() {
        let factory = ScriptedFactory::default();
        let sink = Arc::new(CollectingSink::new());
        let worker = ReplayWorker::new(0, factory, sink.clone(), BatchPolicy::default());

        let input = records(&[
            (1, "a1"),
            (2, "b1"),
            (1, "a2"),
            (3, "c1"),
            (2, "b2"),
            (1, "a3"),
        ]);
        let expected: Vec<String> = input.iter().map(|r| r.statement.clone()).collect();
        worker.run(input).unwrap();

        let outcomes = decode(sink.payloads());
        let got: Vec<String> = outcomes.into_iter().map(|o| o.statement).collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn open_failure_poisons_the_session_but_not_the_partition() {
        let factory = ScriptedFactory {
            refuse_open: vec![2],
            ..ScriptedFactory::default()
        };
        let opens = factory.opens.clone();
        let sink = Arc::new(CollectingSink::new());
        let worker = ReplayWorker::new(0, factory, sink.clone(), BatchPolicy::default());

        let report = worker
            .run(records(&[(1, "a1"), (2, "b1"), (2, "b2"), (1, "a2")]))
            .unwrap();

        assert_eq!(report.processed, 4);
        assert_eq!(report.failed, 2);

        let outcomes = decode(sink.payloads());
        assert!(outcomes[0].success);
        assert!(!outcomes[1].success);
        assert!(outcomes[1]
            .error_message
            .as_deref()
            .unwrap()
            .contains("host unreachable"));
        assert!(!outcomes[2].success);
        assert!(outcomes[3].success);
        // The poisoned session was only dialed once.
        assert_eq!(opens.lock().iter().filter(|s| **s == 2).count(), 1);
    }

    #[test]
    fn cancellation_between_records_still_flushes_buffered_outcomes() {
        let factory = ScriptedFactory::default();
        let sink = Arc::new(CollectingSink::new());
        let cancel = CancelToken::new();
        let worker = ReplayWorker::with_cancel(
            0,
            factory,
            sink.clone(),
            BatchPolicy::default(),
            cancel.clone(),
        );

        let testset = Uuid::new_v4();
        let trigger = cancel.clone();
        let input = (0..10u16).map(move |i| {
            if i == 3 {
                trigger.cancel();
            }
            StatementRecord::new(testset, 1, format!("stmt-{i}"))
        });

        let report = worker.run(input).unwrap();
        assert!(report.cancelled);
        assert_eq!(report.processed, 3);
        assert_eq!(decode(sink.payloads()).len(), 3);
    }

    #[test]
    fn delivery_failure_surfaces_after_connections_close() {
        struct RejectingSink;
        impl BatchTransport for RejectingSink {
            fn send_batch(&self, entries: &[BatchEntry]) -> Result<(), DeliveryError> {
                Err(DeliveryError::new(entries.len(), "sink offline"))
            }
        }

        let factory = ScriptedFactory::default();
        let worker = ReplayWorker::new(
            0,
            factory,
            RejectingSink,
            BatchPolicy::with_max_records(2),
        );

        let err = worker
            .run(records(&[(1, "a"), (1, "b"), (1, "c")]))
            .unwrap_err();
        assert!(err.to_string().contains("sink offline"));
    }
}
