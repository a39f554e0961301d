mod clock;
mod error;
mod profile;
mod shutdown;

pub mod prelude {
    pub use crate::clock::{RunClock, Ticker};
    pub use crate::error::{ConfigError, EngineFault};
    pub use crate::profile::{Interpolation, RampProfile, Stage};
    pub use crate::shutdown::{DelegatedShutdownListener, ShutdownHandle, ShutdownSignalError};
}
