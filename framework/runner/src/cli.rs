use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use surge_core::prelude::{ConfigError, Interpolation, Stage};

use crate::config::{DEFAULT_BASE_URL, DEFAULT_MAX_VUS};
use crate::presets::ProfilePreset;

#[derive(Debug, Clone, Parser)]
#[command(version, about, long_about = None)]
pub struct SurgeScenarioCli {
    /// The base URL of the service to test
    #[clap(long, env = "BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Use a preset ramp profile.
    ///
    /// Ignored if `--stage` or `--profile-file` is given.
    #[clap(long, env = "TEST_TYPE", value_enum)]
    pub profile: Option<ProfilePreset>,

    /// The VU count held by the `concurrency` preset
    #[clap(long, env = "CONCURRENCY", default_value_t = 10)]
    pub concurrency: usize,

    /// Add a ramp stage in the format `<duration>:<target>`. For example `--stage 10s:50`.
    ///
    /// Stages run in the order they are given. When any stage is given, presets and profile files
    /// are ignored.
    #[clap(long = "stage", value_parser = parse_stage)]
    pub stages: Vec<Stage>,

    /// Load the ramp profile from a TOML file with `start_vus`, `interpolation` and `[[stages]]`
    #[clap(long)]
    pub profile_file: Option<PathBuf>,

    /// Override the VU count before the first stage begins
    #[clap(long)]
    pub start_vus: Option<usize>,

    /// Override how targets move between stages, `linear` or `step`
    #[clap(long, value_parser = parse_interpolation)]
    pub interpolation: Option<Interpolation>,

    /// How often the VU target is recomputed
    #[clap(long, value_parser = parse_duration, default_value = "1s")]
    pub tick_interval: Duration,

    /// How long a VU that has been told to stop may take to finish its current iteration before it
    /// is force-stopped
    #[clap(long, value_parser = parse_duration, default_value = "5s")]
    pub graceful_ramp_down: Duration,

    /// The maximum number of VUs that may be alive at once, including VUs that are still stopping
    #[clap(long, default_value_t = DEFAULT_MAX_VUS)]
    pub max_vus: usize,

    /// Add a threshold in the format `<metric>:<expression>`. For example
    /// `--threshold "http_req_duration:p(95)<500"`.
    ///
    /// Thresholds are added to the scenario's own thresholds. If any threshold fails, the run
    /// exits with an error.
    #[clap(long = "threshold", value_parser = parse_threshold)]
    pub thresholds: Vec<(String, String)>,

    /// Directory the JSON run summary is written to
    #[clap(long, default_value = ".")]
    pub summary_dir: PathBuf,

    /// Do not write the JSON run summary file
    #[clap(long, default_value = "false")]
    pub no_summary_file: bool,

    /// Append the run summary as a single JSON line to this file
    #[clap(long, env = "RUN_SUMMARY_PATH")]
    pub summary_log: Option<PathBuf>,

    /// Do not show a progress bar on the CLI.
    ///
    /// This is recommended for CI/CD environments where the progress bar isn't being looked at by anyone and is just adding noise to the logs.
    #[clap(long, default_value = "false")]
    pub no_progress: bool,

    /// Set the run id, otherwise a random one is generated
    #[clap(long)]
    pub run_id: Option<String>,
}

fn parse_stage(s: &str) -> Result<Stage, ConfigError> {
    s.parse()
}

fn parse_interpolation(s: &str) -> Result<Interpolation, ConfigError> {
    s.parse()
}

fn parse_duration(s: &str) -> Result<Duration, humantime_serde::re::humantime::DurationError> {
    humantime_serde::re::humantime::parse_duration(s)
}

fn parse_threshold(s: &str) -> anyhow::Result<(String, String)> {
    let (metric, expression) = s
        .split_once(':')
        .ok_or(anyhow::anyhow!("Expected <metric>:<expression>, got [{s}]"))?;

    if metric.trim().is_empty() {
        anyhow::bail!("No metric specified for threshold [{s}]");
    }

    Ok((metric.trim().to_string(), expression.trim().to_string()))
}
