mod iteration;
mod registry;
mod report;
mod trend;

pub use iteration::{IterationRecord, OperationRecord};
pub use registry::{
    builtin, rate, MetricKind, MetricKindError, MetricRegistry, MetricValue, MetricsSnapshot,
};
pub use report::{print_run_summary, render_run_summary};
pub use trend::TrendSamples;
