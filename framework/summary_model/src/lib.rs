use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{BufRead, Read, Write};
use std::path::Path;

/// Summary of a run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    /// The unique run id
    ///
    /// Chosen by the runner. Unique for each run.
    pub run_id: String,
    /// The name of the scenario that was run
    pub scenario_name: String,
    /// The name of the ramp profile preset, if one was used rather than custom stages
    pub profile_name: Option<String>,
    /// The time the run started
    ///
    /// This is a Unix timestamp in seconds.
    pub started_at: i64,
    /// The stages the run was configured with
    pub stages: Vec<StageSummary>,
    /// The VU count before the first stage begins
    pub start_vus: usize,
    /// The ceiling on concurrently running VUs
    pub max_vus: usize,
    /// The sum of all stage durations, in milliseconds
    pub planned_duration_ms: u64,
    /// How long the run actually took, in milliseconds, including the final drain
    pub elapsed_ms: u64,
    /// Set when the run was cancelled before the ramp profile completed
    ///
    /// The metrics of a partial run only cover the time up to cancellation and should not be
    /// compared with full runs.
    pub partial: bool,
    /// The number of active VUs when the run stopped scheduling
    pub final_vus: usize,
    /// The highest number of active VUs observed at any tick
    pub peak_vus: usize,
    /// Iterations that were still in flight when their VU was force-stopped
    ///
    /// These are counted as neither success nor failure in [RunSummary::metrics].
    pub interrupted_iterations: u64,
    /// Target and active VU counts observed at each tick
    pub timeline: Vec<VuSample>,
    /// Final value of every metric recorded during the run, by name
    pub metrics: BTreeMap<String, MetricSummary>,
    /// Outcome of every configured threshold
    pub thresholds: Vec<ThresholdResult>,
    /// Selected configuration values for the run, such as the target base URL
    pub env: BTreeMap<String, String>,
    /// The version of Surge that was used for this run
    pub surge_version: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageSummary {
    pub duration_ms: u64,
    pub target: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct VuSample {
    pub elapsed_ms: u64,
    pub target: usize,
    pub active: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MetricSummary {
    Counter {
        count: u64,
    },
    Rate {
        passes: u64,
        fails: u64,
        /// `passes / (passes + fails)`, or 0 when nothing was observed
        rate: f64,
    },
    Trend(TrendSummary),
}

/// Distribution of a trend metric. All values are in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrendSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub med: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThresholdResult {
    /// The metric the threshold was checked against
    pub metric: String,
    /// The threshold as it was written, e.g. `p(95)<500`
    pub expression: String,
    /// The aggregated value that was compared, if the metric existed and supports the aggregation
    pub observed: Option<f64>,
    pub passed: bool,
}

impl RunSummary {
    /// Create a new run summary
    pub fn new(
        run_id: String,
        scenario_name: String,
        started_at: i64,
        stages: Vec<StageSummary>,
        max_vus: usize,
        surge_version: String,
    ) -> Self {
        let planned_duration_ms = stages.iter().map(|s| s.duration_ms).sum();

        Self {
            run_id,
            scenario_name,
            profile_name: None,
            started_at,
            stages,
            start_vus: 0,
            max_vus,
            planned_duration_ms,
            elapsed_ms: 0,
            partial: false,
            final_vus: 0,
            peak_vus: 0,
            interrupted_iterations: 0,
            timeline: Vec::new(),
            metrics: BTreeMap::new(),
            thresholds: Vec::new(),
            env: BTreeMap::new(),
            surge_version,
        }
    }

    /// Add a configuration value
    pub fn add_env(&mut self, key: String, value: String) {
        self.env.insert(key, value);
    }

    /// Get a counter value by name
    pub fn counter(&self, name: &str) -> Option<u64> {
        match self.metrics.get(name)? {
            MetricSummary::Counter { count } => Some(*count),
            _ => None,
        }
    }

    /// Get a counter value by name, averaged per second of elapsed run time
    pub fn counter_per_second(&self, name: &str) -> Option<f64> {
        let count = self.counter(name)?;
        if self.elapsed_ms == 0 {
            return Some(0.0);
        }

        Some(count as f64 / (self.elapsed_ms as f64 / 1000.0))
    }

    /// Get a rate value by name
    pub fn rate(&self, name: &str) -> Option<f64> {
        match self.metrics.get(name)? {
            MetricSummary::Rate { rate, .. } => Some(*rate),
            _ => None,
        }
    }

    /// Get a trend distribution by name
    pub fn trend(&self, name: &str) -> Option<&TrendSummary> {
        match self.metrics.get(name)? {
            MetricSummary::Trend(trend) => Some(trend),
            _ => None,
        }
    }

    /// True if no threshold failed. A run with no thresholds passes.
    pub fn thresholds_passed(&self) -> bool {
        self.thresholds.iter().all(|t| t.passed)
    }

    pub fn failed_thresholds(&self) -> impl Iterator<Item = &ThresholdResult> {
        self.thresholds.iter().filter(|t| !t.passed)
    }
}

/// Append the run summary to a file
///
/// The summary will be serialized to JSON and output as a single line followed by a newline. The
/// recommended file extension is `.jsonl`.
pub fn append_run_summary(run_summary: &RunSummary, path: impl AsRef<Path>) -> anyhow::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)?;
    store_run_summary(run_summary, &mut file)?;
    file.write_all(b"\n")?;
    Ok(())
}

/// Write the run summary to its own file as pretty printed JSON, replacing any existing file.
pub fn write_run_summary(run_summary: &RunSummary, path: impl AsRef<Path>) -> anyhow::Result<()> {
    let file = std::fs::File::create(path)?;
    serde_json::to_writer_pretty(file, run_summary)?;
    Ok(())
}

/// Serialize the run summary to a writer
pub fn store_run_summary<W: Write>(run_summary: &RunSummary, writer: &mut W) -> anyhow::Result<()> {
    serde_json::to_writer(writer, run_summary)?;
    Ok(())
}

/// Load a run summary from a reader
pub fn load_run_summary<R: Read>(reader: R) -> anyhow::Result<RunSummary> {
    let reader = std::io::BufReader::new(reader);
    let run_summary: RunSummary = serde_json::from_reader(reader)?;
    Ok(run_summary)
}

/// Load run summaries from a file
///
/// The file should contain one JSON object per line. This is the format produced by
/// [append_run_summary].
pub fn load_summary_runs(path: impl AsRef<Path>) -> anyhow::Result<Vec<RunSummary>> {
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    let mut runs = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let run: RunSummary = serde_json::from_str(&line)?;
        runs.push(run);
    }
    Ok(runs)
}
