use clap::Parser;

use crate::cli::SurgeScenarioCli;

/// Initialise logging and parse the command line for a scenario binary.
pub fn init() -> SurgeScenarioCli {
    env_logger::init();

    SurgeScenarioCli::parse()
}
