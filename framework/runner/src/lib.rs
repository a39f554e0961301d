mod cli;
mod config;
mod context;
mod definition;
mod executor;
mod init;
mod monitor;
mod naming;
mod pool;
mod presets;
mod progress;
mod ramp;
mod run;
mod shutdown;
mod threshold;
mod types;
mod vu;

pub mod prelude {
    pub use crate::cli::SurgeScenarioCli;
    pub use crate::config::{
        RunConfig, DEFAULT_BASE_URL, DEFAULT_GRACEFUL_RAMP_DOWN, DEFAULT_MAX_VUS,
        DEFAULT_TICK_INTERVAL,
    };
    pub use crate::context::{RunnerContext, UserValuesConstraint, VuContext};
    pub use crate::definition::{
        BehaviourFuture, DefaultProfile, HookResult, ScenarioDefinitionBuilder, VuHookMut, VuHooks,
    };
    pub use crate::executor::{Executor, RunReport};
    pub use crate::init::init;
    pub use crate::naming::{default_summary_name, NamingContext, SummaryNameFn};
    pub use crate::presets::{ProfilePreset, TFB_CONCURRENCY_LEVELS};
    pub use crate::ramp::RampScheduler;
    pub use crate::run::{run, ThresholdFailure};
    pub use crate::threshold::{Aggregation, Comparison, Threshold, ThresholdParseError};
    pub use crate::types::SurgeResult;

    pub use surge_core::prelude::*;
    pub use surge_instruments::{builtin, MetricRegistry, OperationRecord};
    pub use surge_summary_model::RunSummary;
}
