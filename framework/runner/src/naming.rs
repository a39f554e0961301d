/// What a naming strategy can use to choose the summary file name.
#[derive(Debug, Clone)]
pub struct NamingContext<'a> {
    pub scenario_name: &'a str,
    /// Short name for the workload, the scenario name unless the scenario set its own
    pub label: &'a str,
    pub run_id: &'a str,
    /// Name of the preset profile, if the run used one
    pub profile_name: Option<&'a str>,
    /// The configured `--concurrency` level
    pub concurrency: usize,
}

/// Chooses the file name, relative to the summary directory, that the run summary is written to.
pub type SummaryNameFn = fn(&NamingContext<'_>) -> String;

/// `results_concurrency_<concurrency>_<label>_summary.json` for the concurrency preset,
/// `results_<profile>_<label>_summary.json` for other presets and
/// `results_custom_<run id>_<label>_summary.json` for custom stages.
pub fn default_summary_name(ctx: &NamingContext<'_>) -> String {
    match ctx.profile_name {
        Some("concurrency") => format!(
            "results_concurrency_{}_{}_summary.json",
            ctx.concurrency, ctx.label
        ),
        Some(profile) => format!("results_{}_{}_summary.json", profile, ctx.label),
        None => format!("results_custom_{}_{}_summary.json", ctx.run_id, ctx.label),
    }
}
