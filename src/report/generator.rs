//! Text, CSV and JSON rendering.
//!
//! This module turns registry snapshots, aggregation results and benchmark
//! reports into the strings shown to the user or written to disk.

use crate::analysis::Aggregation;
use crate::models::{BenchmarkReport, Record, RecordId};
use anyhow::Result;

/// Render all records for the "show all" menu entry.
pub fn render_record_table(entries: &[(RecordId, Record)]) -> String {
    if entries.is_empty() {
        return "Registry is empty.".to_string();
    }

    let mut output = String::new();
    output.push_str("\n--- All Students ---\n");
    for (id, record) in entries {
        output.push_str(&format!("ID: {}\n", id));
        output.push_str(&record.to_string());
        output.push_str("--------------------\n");
    }
    output.push_str(&format!("Total: {} students", entries.len()));

    output
}

/// Render group averages, sorted by group label.
pub fn render_averages(aggregation: &Aggregation) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "\n--- Average Grades by Group ({}) ---\n",
        aggregation.mode
    ));

    let rows = aggregation.sorted();
    if rows.is_empty() {
        output.push_str("No grades recorded.\n");
    } else {
        let width = rows.iter().map(|(group, _)| group.len()).max().unwrap_or(0);
        for (group, average) in rows {
            output.push_str(&format!("{:<width$}  {:.3}\n", group, average, width = width));
        }
    }

    output.push_str(&format!(
        "Computed in {:.3} ms",
        aggregation.elapsed.as_secs_f64() * 1000.0
    ));

    output
}

/// Generate a CSV benchmark report, one row per population size.
pub fn generate_csv_report(report: &BenchmarkReport) -> String {
    let mut output = String::new();

    output.push_str("records,groups,sequential_ms,parallel_ms,speedup,results_match\n");
    for row in &report.rows {
        output.push_str(&format!(
            "{},{},{:.3},{:.3},{:.2},{}\n",
            row.records,
            row.groups,
            row.sequential_ms,
            row.parallel_ms,
            row.speedup,
            row.results_match
        ));
    }

    output
}

/// Generate a JSON benchmark report.
pub fn generate_json_report(report: &BenchmarkReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}
