use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use futures::future::BoxFuture;
use surge_core::prelude::{ConfigError, RampProfile};

use crate::cli::SurgeScenarioCli;
use crate::config::RunConfig;
use crate::context::{RunnerContext, UserValuesConstraint, VuContext};
use crate::naming::{default_summary_name, SummaryNameFn};
use crate::presets::ProfilePreset;
use crate::threshold::Threshold;

pub type HookResult = anyhow::Result<()>;

/// The future returned by a VU hook. Write hooks as
/// `fn hook(ctx: &mut VuContext<RV, V>) -> BehaviourFuture<'_> { Box::pin(async move { .. }) }`.
pub type BehaviourFuture<'a> = BoxFuture<'a, HookResult>;

pub type GlobalHookMut<RV> = fn(&mut RunnerContext<RV>) -> HookResult;
pub type GlobalHook<RV> = fn(Arc<RunnerContext<RV>>) -> HookResult;
pub type VuHookMut<RV, V> = for<'a> fn(&'a mut VuContext<RV, V>) -> BehaviourFuture<'a>;

/// The hooks run by every VU.
pub struct VuHooks<RV: UserValuesConstraint, V: UserValuesConstraint> {
    /// Run once when the VU starts. If it fails, the VU exits without running its behaviour.
    pub setup: Option<VuHookMut<RV, V>>,
    /// Run once per iteration until the VU is told to stop.
    pub behaviour: Option<VuHookMut<RV, V>>,
    /// Run once when the VU stops, unless it was force-stopped.
    pub teardown: Option<VuHookMut<RV, V>>,
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> VuHooks<RV, V> {
    pub fn new(behaviour: VuHookMut<RV, V>) -> Self {
        Self {
            behaviour: Some(behaviour),
            ..Default::default()
        }
    }

    pub fn with_setup(mut self, setup: VuHookMut<RV, V>) -> Self {
        self.setup = Some(setup);
        self
    }

    pub fn with_teardown(mut self, teardown: VuHookMut<RV, V>) -> Self {
        self.teardown = Some(teardown);
        self
    }
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> Default for VuHooks<RV, V> {
    fn default() -> Self {
        Self {
            setup: None,
            behaviour: None,
            teardown: None,
        }
    }
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> Clone for VuHooks<RV, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> Copy for VuHooks<RV, V> {}

/// The ramp profile used when none is chosen on the command line.
#[derive(Debug, Clone)]
pub enum DefaultProfile {
    Preset(ProfilePreset),
    Custom(RampProfile),
}

impl From<ProfilePreset> for DefaultProfile {
    fn from(value: ProfilePreset) -> Self {
        DefaultProfile::Preset(value)
    }
}

impl From<RampProfile> for DefaultProfile {
    fn from(value: RampProfile) -> Self {
        DefaultProfile::Custom(value)
    }
}

/// The builder for a scenario definition.
///
/// This must be used at the start of a test to define the scenario that you want to run.
pub struct ScenarioDefinitionBuilder<RV: UserValuesConstraint, V: UserValuesConstraint> {
    /// The name of the scenario, which should be unique within the test suite.
    ///
    /// Recommended value is `env!("CARGO_PKG_NAME")`.
    name: String,
    /// This value is initialised for you and you cannot change it.
    #[doc(hidden)]
    cli: SurgeScenarioCli,
    default_profile: Option<DefaultProfile>,
    /// Thresholds that always apply to this scenario, as `(metric, expression)`.
    thresholds: Vec<(String, String)>,
    summary_label: Option<String>,
    summary_name_fn: SummaryNameFn,
    /// Global setup hook for this scenario. It will be run once, before any VUs are started.
    setup_fn: Option<GlobalHookMut<RV>>,
    vu_hooks: VuHooks<RV, V>,
    /// Global teardown hook for this scenario. It is run once after all VUs have stopped.
    ///
    /// This hook is best effort. A failure is logged and does not fail the run.
    teardown_fn: Option<GlobalHook<RV>>,
}

pub(crate) struct ScenarioDefinition<RV: UserValuesConstraint, V: UserValuesConstraint> {
    pub(crate) name: String,
    pub(crate) config: RunConfig,
    /// Set when the profile came from a preset
    pub(crate) profile_name: Option<String>,
    pub(crate) thresholds: Vec<Threshold>,
    pub(crate) summary_label: String,
    pub(crate) concurrency: usize,
    pub(crate) summary_name_fn: SummaryNameFn,
    pub(crate) summary_dir: PathBuf,
    pub(crate) no_summary_file: bool,
    pub(crate) summary_log: Option<PathBuf>,
    pub(crate) no_progress: bool,
    pub(crate) run_id: Option<String>,
    pub(crate) setup_fn: Option<GlobalHookMut<RV>>,
    pub(crate) vu_hooks: VuHooks<RV, V>,
    pub(crate) teardown_fn: Option<GlobalHook<RV>>,
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> ScenarioDefinitionBuilder<RV, V> {
    /// Initialise a new scenario definition from the scenario name and command line arguments.
    /// See the [ScenarioDefinitionBuilder::name] for more information about the name.
    pub fn new(name: &str, cli: SurgeScenarioCli) -> Self {
        Self {
            name: name.to_string(),
            cli,
            default_profile: None,
            thresholds: Vec::new(),
            summary_label: None,
            summary_name_fn: default_summary_name,
            setup_fn: None,
            vu_hooks: VuHooks::default(),
            teardown_fn: None,
        }
    }

    /// Initialise logging and parse the command line, then create the definition.
    pub fn new_with_init(name: &str) -> Self {
        Self::new(name, crate::init::init())
    }

    /// The profile to use when neither `--profile`, `--stage` nor `--profile-file` is given.
    pub fn with_default_profile(mut self, profile: impl Into<DefaultProfile>) -> Self {
        self.default_profile = Some(profile.into());
        self
    }

    /// Add a threshold, such as `("http_req_duration", "p(95)<500")`. The expression is checked
    /// when the definition is built.
    pub fn with_threshold(mut self, metric: &str, expression: &str) -> Self {
        self.thresholds
            .push((metric.to_string(), expression.to_string()));
        self
    }

    /// A short name for the summary file, such as the endpoint under test. Defaults to the
    /// scenario name.
    pub fn with_summary_label(mut self, label: &str) -> Self {
        self.summary_label = Some(label.to_string());
        self
    }

    /// Replace the strategy used to name the run summary file.
    pub fn use_summary_name(mut self, summary_name_fn: SummaryNameFn) -> Self {
        self.summary_name_fn = summary_name_fn;
        self
    }

    /// Set the global setup hook [ScenarioDefinitionBuilder::setup_fn] for this scenario.
    pub fn use_setup(mut self, setup_fn: GlobalHookMut<RV>) -> Self {
        self.setup_fn = Some(setup_fn);
        self
    }

    pub fn use_vu_setup(mut self, setup_fn: VuHookMut<RV, V>) -> Self {
        self.vu_hooks.setup = Some(setup_fn);
        self
    }

    /// Set the behaviour that every VU runs once per iteration.
    ///
    /// An `Err` or a panic counts as a failed iteration and the VU carries on with the next one.
    pub fn use_vu_behaviour(mut self, behaviour: VuHookMut<RV, V>) -> Self {
        self.vu_hooks.behaviour = Some(behaviour);
        self
    }

    pub fn use_vu_teardown(mut self, teardown_fn: VuHookMut<RV, V>) -> Self {
        self.vu_hooks.teardown = Some(teardown_fn);
        self
    }

    /// Set the global teardown hook [ScenarioDefinitionBuilder::teardown_fn] for this scenario.
    pub fn use_teardown(mut self, teardown_fn: GlobalHook<RV>) -> Self {
        self.teardown_fn = Some(teardown_fn);
        self
    }

    pub(crate) fn build(self) -> anyhow::Result<ScenarioDefinition<RV, V>> {
        let (mut profile, profile_name) = self.resolve_profile()?;

        if let Some(start_vus) = self.cli.start_vus {
            profile.start_vus = start_vus;
        }
        if let Some(interpolation) = self.cli.interpolation {
            profile.interpolation = interpolation;
        }

        let config = RunConfig::new(profile)
            .with_base_url(self.cli.base_url.clone())
            .with_tick_interval(self.cli.tick_interval)
            .with_graceful_ramp_down(self.cli.graceful_ramp_down)
            .with_max_vus(self.cli.max_vus);
        config.validate()?;

        let thresholds = self
            .thresholds
            .iter()
            .chain(self.cli.thresholds.iter())
            .map(|(metric, expression)| {
                Threshold::parse(metric, expression).map_err(|e| ConfigError::InvalidThreshold {
                    metric: metric.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ScenarioDefinition {
            summary_label: self.summary_label.unwrap_or_else(|| self.name.clone()),
            concurrency: self.cli.concurrency,
            name: self.name,
            config,
            profile_name: profile_name.map(ToString::to_string),
            thresholds,
            summary_name_fn: self.summary_name_fn,
            summary_dir: self.cli.summary_dir,
            no_summary_file: self.cli.no_summary_file,
            summary_log: self.cli.summary_log,
            no_progress: self.cli.no_progress,
            run_id: self.cli.run_id,
            setup_fn: self.setup_fn,
            vu_hooks: self.vu_hooks,
            teardown_fn: self.teardown_fn,
        })
    }

    /// Explicit stages win over a profile file, which wins over a preset, which wins over the
    /// scenario default.
    fn resolve_profile(&self) -> anyhow::Result<(RampProfile, Option<&'static str>)> {
        if !self.cli.stages.is_empty() {
            return Ok((RampProfile::new(self.cli.stages.clone()), None));
        }

        if let Some(path) = &self.cli.profile_file {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read profile file {}", path.display()))?;
            let profile = toml::from_str::<RampProfile>(&content)
                .with_context(|| format!("Failed to parse profile file {}", path.display()))?;
            return Ok((profile, None));
        }

        if let Some(preset) = self.cli.profile {
            return Ok((preset.profile(self.cli.concurrency), Some(preset.name())));
        }

        match &self.default_profile {
            Some(DefaultProfile::Preset(preset)) => {
                Ok((preset.profile(self.cli.concurrency), Some(preset.name())))
            }
            Some(DefaultProfile::Custom(profile)) => Ok((profile.clone(), None)),
            None => anyhow::bail!(
                "No ramp profile configured for scenario [{}], use --profile, --stage or --profile-file",
                self.name
            ),
        }
    }
}
