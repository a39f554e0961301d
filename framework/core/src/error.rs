/// The run configuration is invalid. Detected before any VU is spawned.
#[derive(derive_more::Error, derive_more::Display, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[display("Ramp profile has no stages")]
    EmptyProfile,
    #[display("Stage {index} has a zero duration")]
    ZeroDurationStage { index: usize },
    #[display("Invalid stage [{input}]: {reason}")]
    InvalidStage { input: String, reason: String },
    #[display("Unknown interpolation [{input}], expected one of [linear, step]")]
    InvalidInterpolation { input: String },
    #[display("Tick interval must be greater than zero")]
    ZeroTickInterval,
    #[display("Maximum VUs must be greater than zero")]
    ZeroMaxVus,
    #[display("Invalid threshold for [{metric}]: {reason}")]
    InvalidThreshold { metric: String, reason: String },
}

/// The engine itself misbehaved. This is not caused by the workload and aborts the run.
#[derive(derive_more::Error, derive_more::Display, Debug)]
#[display("Internal engine fault: {msg}")]
pub struct EngineFault {
    msg: String,
}

impl EngineFault {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}
