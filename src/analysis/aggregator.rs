//! Per-group score aggregation.
//!
//! This module computes the average score of every group label in a table of
//! records, either on the calling thread or fanned out across a bounded pool
//! of scoped worker threads. Both paths use the same score extraction and
//! tally arithmetic, so they agree up to floating-point summation order.

use crate::models::Record;
use crate::table::OpenAddressingMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};
use tracing::debug;

/// Worker count used when hardware concurrency cannot be queried.
pub const FALLBACK_WORKERS: usize = 4;

/// Tolerance used when comparing sequential and parallel results.
pub const AGREEMENT_EPSILON: f64 = 1e-6;

/// How the aggregation pass is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationMode {
    Sequential,
    Parallel,
}

impl fmt::Display for AggregationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregationMode::Sequential => write!(f, "sequential"),
            AggregationMode::Parallel => write!(f, "parallel"),
        }
    }
}

/// Result of one aggregation call.
#[derive(Debug, Clone)]
pub struct Aggregation {
    pub mode: AggregationMode,
    /// Group label to mean score. Groups without any score are absent.
    pub averages: HashMap<String, f64>,
    /// Wall-clock time spent inside the call.
    pub elapsed: Duration,
}

impl Aggregation {
    /// Whether both results cover the same groups with averages within `epsilon`.
    pub fn agrees_with(&self, other: &Aggregation, epsilon: f64) -> bool {
        self.averages.len() == other.averages.len()
            && self.averages.iter().all(|(group, average)| {
                other
                    .averages
                    .get(group)
                    .is_some_and(|theirs| (theirs - average).abs() <= epsilon)
            })
    }

    /// Averages sorted by group label.
    pub fn sorted(&self) -> Vec<(&str, f64)> {
        let mut rows: Vec<_> = self
            .averages
            .iter()
            .map(|(group, average)| (group.as_str(), *average))
            .collect();
        rows.sort_by(|a, b| a.0.cmp(b.0));
        rows
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct ScoreTally {
    sum: f64,
    count: usize,
}

impl ScoreTally {
    fn add(&mut self, score: f64) {
        self.sum += score;
        self.count += 1;
    }

    fn merge(&mut self, other: ScoreTally) {
        self.sum += other.sum;
        self.count += other.count;
    }

    fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Scores contributed by one record.
///
/// Junior: session grades. Senior: session grades plus both research work
/// grades. Graduate: the three diploma project grades only.
pub fn record_scores(record: &Record) -> Vec<f64> {
    match record {
        Record::Junior(r) => r.session_grades.iter().map(|&g| f64::from(g)).collect(),
        Record::Senior(r) => r
            .session_grades
            .iter()
            .copied()
            .chain([r.research.supervisor_grade, r.research.commission_grade])
            .map(f64::from)
            .collect(),
        Record::Graduate(r) => [
            r.diploma.supervisor_grade,
            r.diploma.reviewer_grade,
            r.diploma.state_commission_grade,
        ]
        .into_iter()
        .map(f64::from)
        .collect(),
    }
}

/// Resolve a configured worker count; zero means "one per hardware thread".
pub fn worker_count(configured: usize) -> usize {
    if configured > 0 {
        return configured;
    }
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(FALLBACK_WORKERS)
}

/// Compute the mean score of every group in `table`.
///
/// The table is only read. Callers that share it must keep it from changing
/// until this returns.
pub fn aggregate_by_group<K, S>(
    table: &OpenAddressingMap<K, Record, S>,
    mode: AggregationMode,
    workers: usize,
) -> Aggregation {
    let start = Instant::now();

    let tallies = match mode {
        AggregationMode::Sequential => tally_records(table.iter().map(|(_, record)| record)),
        AggregationMode::Parallel => {
            let records: Vec<&Record> = table.iter().map(|(_, record)| record).collect();
            parallel_tallies(&records, workers)
        }
    };

    let averages: HashMap<String, f64> = tallies
        .into_iter()
        .filter_map(|(group, tally)| tally.mean().map(|mean| (group.to_string(), mean)))
        .collect();

    let elapsed = start.elapsed();
    debug!(
        "Aggregated {} records into {} groups ({} mode) in {:?}",
        table.len(),
        averages.len(),
        mode,
        elapsed
    );

    Aggregation {
        mode,
        averages,
        elapsed,
    }
}

fn tally_records<'a>(
    records: impl IntoIterator<Item = &'a Record>,
) -> HashMap<&'a str, ScoreTally> {
    let mut tallies: HashMap<&'a str, ScoreTally> = HashMap::new();

    for record in records {
        let tally = tallies.entry(record.group()).or_default();
        for score in record_scores(record) {
            tally.add(score);
        }
    }

    tallies
}

/// Split `records` into contiguous slices, one per worker. Each worker tallies
/// its slice privately and then folds the finished partial result into the
/// shared output under its own lock.
fn parallel_tallies<'a>(records: &[&'a Record], workers: usize) -> HashMap<&'a str, ScoreTally> {
    if records.is_empty() {
        return HashMap::new();
    }

    let workers = worker_count(workers).min(records.len());
    let per_worker = records.len().div_ceil(workers);
    let output: Mutex<HashMap<&'a str, ScoreTally>> = Mutex::new(HashMap::new());

    std::thread::scope(|scope| {
        for slice in records.chunks(per_worker) {
            let output = &output;
            scope.spawn(move || {
                let partial = tally_records(slice.iter().copied());
                let mut merged = output.lock();
                for (group, tally) in partial {
                    merged.entry(group).or_default().merge(tally);
                }
            });
        }
    });

    output.into_inner()
}
