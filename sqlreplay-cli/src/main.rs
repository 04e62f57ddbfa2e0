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

//! Sqlreplay CLI
//!
//! Local driver for the workload-replay pipeline: `extract` parses a
//! captured session trace and dispatches statement records into a
//! directory-backed queue; `replay` runs one worker per partition against
//! the target engine and streams outcomes to a JSONL results sink.

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use sqlreplay_core::{BatchPolicy, StatementRecord, TargetConfig, DEFAULT_SHARD_COUNT};
use sqlreplay_dispatch::{DirectoryQueue, PartitionConsumer, StatementDispatcher};
use sqlreplay_replay::{
    ConnectionFactory, JsonlFileSink, NullFactory, ReplayReport, ReplayWorker, SqliteFactory,
};
use sqlreplay_trace::{StatementExtractor, TraceReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, Level};

#[derive(Parser)]
#[command(name = "sqlreplay")]
#[command(about = "Sqlreplay - session-trace workload replay", long_about = None)]
struct Cli {
    /// Verbose mode
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract statements from a captured session trace and dispatch them
    /// into the partitioned queue
    Extract {
        /// Trace file (.strc)
        source: PathBuf,

        /// Maximum number of statements to emit
        #[arg(long)]
        limit: Option<u64>,

        /// Number of queue partitions
        #[arg(long, default_value_t = DEFAULT_SHARD_COUNT)]
        shards: u32,

        /// Queue directory (one JSONL file per partition)
        #[arg(long, default_value = "./sqlreplay-queue")]
        queue_dir: PathBuf,
    },

    /// Replay queued partitions against the target database
    Replay {
        /// Queue directory produced by `extract`
        #[arg(long, default_value = "./sqlreplay-queue")]
        queue_dir: PathBuf,

        /// Partition to replay; omitted means every partition, one worker
        /// thread each
        #[arg(long)]
        partition: Option<u32>,

        /// Number of queue partitions
        #[arg(long, default_value_t = DEFAULT_SHARD_COUNT)]
        shards: u32,

        /// Target engine tag ("sqlite" or "null"); defaults to
        /// DATABASE_ENGINE
        #[arg(long)]
        engine: Option<String>,

        /// SQLite database path (sqlite engine only)
        #[arg(long)]
        database: Option<PathBuf>,

        /// Results sink file (JSONL)
        #[arg(long, default_value = "./sqlreplay-results.jsonl")]
        results: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    match cli.command {
        Commands::Extract {
            source,
            limit,
            shards,
            queue_dir,
        } => run_extract(&source, limit, shards, &queue_dir),
        Commands::Replay {
            queue_dir,
            partition,
            shards,
            engine,
            database,
            results,
        } => run_replay(&queue_dir, partition, shards, engine, database.as_deref(), &results),
    }
}

fn run_extract(source: &Path, limit: Option<u64>, shards: u32, queue_dir: &Path) -> Result<()> {
    info!(source = %source.display(), ?limit, shards, "starting extraction job");

    let reader = TraceReader::open(source)?;
    let mut extractor = StatementExtractor::new(reader, limit);
    let queue =
        DirectoryQueue::create(queue_dir, shards).context("failed to create queue directory")?;
    let mut dispatcher = StatementDispatcher::new(&queue, BatchPolicy::default());

    while let Some(item) = extractor.next() {
        let record = match item {
            Ok(record) => record,
            Err(err) => {
                report_extract_abort(&extractor.stats(), &dispatcher.stats());
                return Err(err.into());
            }
        };
        if let Err(err) = dispatcher.dispatch(&record) {
            report_extract_abort(&extractor.stats(), &dispatcher.stats());
            return Err(err.into());
        }
    }

    let flushed_before_finish = dispatcher.stats();
    let delivered = match dispatcher.finish() {
        Ok(stats) => stats,
        Err(err) => {
            report_extract_abort(&extractor.stats(), &flushed_before_finish);
            return Err(err.into());
        }
    };
    let stats = extractor.stats();
    info!(
        testset_id = %extractor.testset_id(),
        emitted = stats.emitted,
        skipped = stats.skipped,
        batches = delivered.batches,
        "extraction complete"
    );
    Ok(())
}

fn report_extract_abort(
    stats: &sqlreplay_trace::ExtractStats,
    flushed: &sqlreplay_core::BatchStats,
) {
    error!(
        emitted = stats.emitted,
        skipped = stats.skipped,
        flushed_batches = flushed.batches,
        flushed_records = flushed.records,
        "extraction aborted after partial progress"
    );
}

fn build_factory(
    target: &TargetConfig,
    database: Option<&Path>,
) -> Result<Box<dyn ConnectionFactory>> {
    match target.engine.as_str() {
        "sqlite" => {
            let db = database
                .ok_or_else(|| anyhow!("--database is required for the sqlite engine"))?;
            Ok(Box::new(SqliteFactory::new(db)))
        }
        "null" => Ok(Box::new(NullFactory::new())),
        other => bail!("engine '{other}' has no local driver; use 'sqlite' or 'null'"),
    }
}

fn drain_partition(queue: &DirectoryQueue, partition: u32) -> Result<Vec<StatementRecord>> {
    let mut records = Vec::new();
    loop {
        let payloads = queue.take_batch(partition, 500)?;
        if payloads.is_empty() {
            break;
        }
        for payload in payloads {
            let record: StatementRecord = serde_json::from_slice(&payload)
                .with_context(|| format!("corrupt payload in partition {partition}"))?;
            records.push(record);
        }
    }
    Ok(records)
}

fn run_replay(
    queue_dir: &Path,
    partition: Option<u32>,
    shards: u32,
    engine: Option<String>,
    database: Option<&Path>,
    results: &Path,
) -> Result<()> {
    let mut target = TargetConfig::from_env();
    if let Some(engine) = engine {
        target.engine = engine;
    }
    info!(
        queue_dir = %queue_dir.display(),
        engine = %target.engine,
        results = %results.display(),
        "starting replay job"
    );

    let queue = DirectoryQueue::create(queue_dir, shards)
        .context("failed to open queue directory")?;
    let sink =
        Arc::new(JsonlFileSink::create(results).context("failed to create results sink")?);
    let partitions: Vec<u32> = match partition {
        Some(p) => {
            if p >= shards {
                bail!("partition {p} out of range (shards = {shards})");
            }
            vec![p]
        }
        None => (0..shards).collect(),
    };

    // One worker per partition; workers never share connections.
    let mut results_by_partition: Vec<Result<ReplayReport>> = Vec::new();
    std::thread::scope(|scope| {
        let mut handles = Vec::new();
        for p in partitions {
            let queue = &queue;
            let sink = sink.clone();
            let target = &target;
            handles.push(scope.spawn(move || -> Result<ReplayReport> {
                let input = drain_partition(queue, p)?;
                let factory = build_factory(target, database)?;
                let worker = ReplayWorker::new(p, factory, sink, BatchPolicy::default());
                worker.run(input).map_err(Into::into)
            }));
        }
        for handle in handles {
            results_by_partition
                .push(handle.join().unwrap_or_else(|_| Err(anyhow!("worker panicked"))));
        }
    });

    let mut processed = 0u64;
    let mut succeeded = 0u64;
    let mut failed = 0u64;
    let mut first_error = None;
    for result in results_by_partition {
        match result {
            Ok(report) => {
                processed += report.processed;
                succeeded += report.succeeded;
                failed += report.failed;
            }
            Err(err) => {
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }
    }

    if let Some(err) = first_error {
        error!(
            processed,
            succeeded, failed, "replay aborted after partial progress"
        );
        return Err(err);
    }
    info!(processed, succeeded, failed, "replay complete");
    Ok(())
}
