mod tables;

use std::fmt::Write;

use surge_summary_model::{MetricSummary, RunSummary};
use tabled::settings::Style;
use tabled::Table;

use crate::report::tables::{ThresholdRow, TrendRow, ValueRow};

/// Print a human readable summary of a run to stdout.
pub fn print_run_summary(summary: &RunSummary) {
    println!("{}", render_run_summary(summary));
}

/// Render the run header, metric tables and threshold outcomes.
pub fn render_run_summary(summary: &RunSummary) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "\nSummary of run {} for scenario [{}]{}",
        summary.run_id,
        summary.scenario_name,
        if summary.partial {
            " (PARTIAL, cancelled before the profile completed)"
        } else {
            ""
        }
    );
    let started_at = chrono::DateTime::from_timestamp(summary.started_at, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| summary.started_at.to_string());
    let _ = writeln!(out, "Started at {started_at}");
    let _ = writeln!(
        out,
        "Elapsed {:.1}s of {:.1}s planned, VUs: final {} / peak {} / max {}, interrupted iterations: {}",
        summary.elapsed_ms as f64 / 1000.0,
        summary.planned_duration_ms as f64 / 1000.0,
        summary.final_vus,
        summary.peak_vus,
        summary.max_vus,
        summary.interrupted_iterations,
    );

    let value_rows = summary
        .metrics
        .iter()
        .filter_map(|(name, metric)| match metric {
            MetricSummary::Counter { count } => Some(ValueRow {
                metric: name.clone(),
                kind: "counter".to_string(),
                value: count.to_string(),
                detail: format!(
                    "{:.2}/s",
                    summary.counter_per_second(name).unwrap_or_default()
                ),
            }),
            MetricSummary::Rate {
                passes,
                fails,
                rate,
            } => Some(ValueRow {
                metric: name.clone(),
                kind: "rate".to_string(),
                value: format!("{:.2}%", rate * 100.0),
                detail: format!("{passes} passes, {fails} fails"),
            }),
            MetricSummary::Trend(_) => None,
        })
        .collect::<Vec<_>>();

    if !value_rows.is_empty() {
        let mut table = Table::new(value_rows);
        table.with(Style::modern());
        let _ = writeln!(out, "\nCounters and rates\n{table}");
    }

    let trend_rows = summary
        .metrics
        .iter()
        .filter_map(|(name, metric)| match metric {
            MetricSummary::Trend(trend) => Some(TrendRow {
                metric: format!("{name} (ms)"),
                avg: trend.avg,
                min: trend.min,
                med: trend.med,
                max: trend.max,
                p90: trend.p90,
                p95: trend.p95,
                p99: trend.p99,
                count: trend.count,
            }),
            _ => None,
        })
        .collect::<Vec<_>>();

    if !trend_rows.is_empty() {
        let mut table = Table::new(trend_rows);
        table.with(Style::modern());
        let _ = writeln!(out, "\nTrends\n{table}");
    }

    if !summary.thresholds.is_empty() {
        let rows = summary
            .thresholds
            .iter()
            .map(|t| ThresholdRow {
                metric: t.metric.clone(),
                threshold: t.expression.clone(),
                observed: t.observed,
                result: if t.passed { "pass" } else { "FAIL" }.to_string(),
            })
            .collect::<Vec<_>>();

        let mut table = Table::new(rows);
        table.with(Style::modern());
        let _ = writeln!(out, "\nThresholds\n{table}");
    }

    out
}
