//! Aggregation benchmark.
//!
//! Fills a fresh registry with reproducible pseudo-random records for each
//! requested population size, times both aggregation modes and checks that
//! they agree.

use crate::analysis::{worker_count, AggregationMode, AGREEMENT_EPSILON};
use crate::models::{
    BenchmarkMetadata, BenchmarkReport, BenchmarkRow, DiplomaProject, Profile, Record,
    RecordId, ResearchWork,
};
use crate::registry::Registry;
use anyhow::Result;
use chrono::Utc;
use fastrand::Rng;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

const SURNAMES: &[&str] = &[
    "Ivanov", "Petrov", "Sidorov", "Kozlov", "Novikov", "Morozov", "Petrenko", "Shevchenko",
    "Bondarenko", "Melnik", "Romanenko", "Pavlenko", "Marchenko", "Tkachenko", "Vasilenko",
    "Kravchenko", "Oleinik", "Tarasenko", "Lysenko", "Kovalenko",
];

const FIRST_NAMES: &[&str] = &[
    "Alexander", "Dmitry", "Maxim", "Sergey", "Andrey", "Alexey", "Artem", "Ilya", "Kirill",
    "Mikhail", "Nikita", "Matvey", "Roman", "Egor", "Denis", "Stepan", "Vladimir", "Pavel",
];

const FACULTIES: &[&str] = &["IU", "IT", "IB", "IM", "IE"];
const STREAMS: &[&str] = &["A", "B", "C", "D", "E"];

const RESEARCH_TOPICS: &[&str] = &[
    "Database management systems",
    "Machine learning algorithms",
    "Cryptographic protection methods",
    "Mobile healthcare applications",
    "Computer vision methods",
];

const RESEARCH_PLACES: &[&str] = &["Google", "Microsoft", "Intel", "NVIDIA", "IBM", "Oracle"];

const DIPLOMA_TOPICS: &[&str] = &[
    "Quantum optimisation algorithms",
    "Distributed artificial intelligence",
    "Natural language processing",
    "Parallel computation efficiency",
    "Data compression methods",
];

const DIPLOMA_PLACES: &[&str] = &["MIT", "Stanford", "Berkeley", "CMU", "Princeton", "Cornell"];

/// Parameters for one benchmark run.
#[derive(Debug, Clone)]
pub struct BenchmarkSettings {
    /// Population sizes to measure, in order.
    pub sizes: Vec<usize>,
    /// Seed shared by every population.
    pub seed: u64,
    /// Configured parallel worker count (0 = hardware concurrency).
    pub workers: usize,
    /// Initial table capacity of each fresh registry.
    pub initial_capacity: usize,
    /// Whether to draw a progress bar while populating.
    pub show_progress: bool,
}

/// Measure every configured population size.
pub fn run_benchmark(settings: &BenchmarkSettings) -> Result<BenchmarkReport> {
    let workers = worker_count(settings.workers);
    info!(
        "Benchmarking {} population sizes with {} workers (seed {})",
        settings.sizes.len(),
        workers,
        settings.seed
    );

    let mut rows = Vec::with_capacity(settings.sizes.len());
    for &size in &settings.sizes {
        rows.push(measure_size(size, settings)?);
    }

    Ok(BenchmarkReport {
        metadata: BenchmarkMetadata {
            generated_at: Utc::now(),
            seed: settings.seed,
            workers,
        },
        rows,
    })
}

fn measure_size(size: usize, settings: &BenchmarkSettings) -> Result<BenchmarkRow> {
    println!("\n📦 Populating registry with {} records...", size);

    let registry = Registry::new(settings.initial_capacity, settings.workers);
    let mut rng = Rng::with_seed(settings.seed);

    let progress_bar = if settings.show_progress {
        let pb = ProgressBar::new(size as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}")?
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    for id in 1..=size as RecordId {
        registry.insert_with_id(id, random_record(&mut rng, id)?)?;
        if let Some(ref pb) = progress_bar {
            pb.inc(1);
        }
    }

    if let Some(pb) = progress_bar {
        pb.finish_and_clear();
    }

    let sequential = registry.aggregate_by_group(AggregationMode::Sequential);
    let parallel = registry.aggregate_by_group(AggregationMode::Parallel);
    let results_match = sequential.agrees_with(&parallel, AGREEMENT_EPSILON);

    let sequential_ms = sequential.elapsed.as_secs_f64() * 1000.0;
    let parallel_ms = parallel.elapsed.as_secs_f64() * 1000.0;
    let speedup = if parallel_ms > 0.0 {
        sequential_ms / parallel_ms
    } else {
        0.0
    };

    if results_match {
        println!("   ✅ Results match ({} groups)", sequential.averages.len());
    } else {
        warn!("Sequential and parallel results differ for {} records", size);
        println!("   ❌ Results do not match!");
    }
    println!("   Sequential: {:.2} ms", sequential_ms);
    println!("   Parallel:   {:.2} ms", parallel_ms);
    println!("   Speedup:    {:.2}x", speedup);

    Ok(BenchmarkRow {
        records: size,
        groups: sequential.averages.len(),
        sequential_ms,
        parallel_ms,
        speedup,
        results_match,
    })
}

fn pick<'a>(rng: &mut Rng, items: &[&'a str]) -> &'a str {
    items[rng.usize(..items.len())]
}

/// A group label such as `IU3-42B`.
fn random_group(rng: &mut Rng) -> String {
    format!(
        "{}{}-{}{}",
        pick(rng, FACULTIES),
        rng.u8(1..=5),
        rng.u8(1..=99),
        pick(rng, STREAMS)
    )
}

fn random_grades(rng: &mut Rng, count: usize) -> Vec<i32> {
    (0..count).map(|_| rng.i32(2..=5)).collect()
}

/// Generate a valid record of a random category.
pub fn random_record(rng: &mut Rng, id: RecordId) -> Result<Record> {
    let name = format!("{} {}", pick(rng, SURNAMES), pick(rng, FIRST_NAMES));
    let group = random_group(rng);
    let department = 100 + (id % 20) as i32;
    let profile = Profile::new(name, group, department)?;

    let record = match rng.u8(0..3) {
        0 => Record::junior(profile, random_grades(rng, 5))?,
        1 => {
            let grades = random_grades(rng, 4);
            let research = ResearchWork {
                topic: pick(rng, RESEARCH_TOPICS).to_string(),
                place: pick(rng, RESEARCH_PLACES).to_string(),
                supervisor_grade: rng.i32(3..=5),
                commission_grade: rng.i32(3..=5),
            };
            Record::senior(profile, grades, research)?
        }
        _ => Record::graduate(
            profile,
            DiplomaProject {
                topic: pick(rng, DIPLOMA_TOPICS).to_string(),
                place: pick(rng, DIPLOMA_PLACES).to_string(),
                supervisor_grade: rng.i32(3..=5),
                reviewer_grade: rng.i32(3..=5),
                state_commission_grade: rng.i32(3..=5),
            },
        ),
    };

    Ok(record)
}
