/// Result type for scenario `main` functions and helpers shared between hooks. It is the same
/// error type as [crate::definition::HookResult], so errors from either side propagate with `?`.
pub type SurgeResult<T> = anyhow::Result<T>;
