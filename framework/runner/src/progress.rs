use std::fmt::Write;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressState, ProgressStyle};
use surge_core::prelude::DelegatedShutdownListener;

/// Displays a progress bar while the run is going, with the time left in the ramp profile and the
/// current number of active VUs.
pub(crate) fn start_progress(
    planned_runtime: Duration,
    active_vus: impl Fn() -> usize + Send + 'static,
    mut shutdown_listener: DelegatedShutdownListener,
) -> anyhow::Result<()> {
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{wide_bar:.cyan/blue}] [{elapsed_precise} / {planned_runtime}] {msg}",
    )?
    .with_key(
        "planned_runtime",
        move |_state: &ProgressState, w: &mut dyn Write| {
            let secs = planned_runtime.as_secs();
            let _ = write!(w, "{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60);
        },
    )
    .progress_chars("#>-");

    std::thread::Builder::new()
        .name("progress".to_string())
        .spawn(move || {
            let start_time = Instant::now();
            let pb = ProgressBar::new(planned_runtime.as_secs());
            pb.set_style(style);

            loop {
                if shutdown_listener.should_shutdown() {
                    log::trace!("Progress thread shutting down");
                    pb.finish_and_clear();
                    break;
                }

                pb.set_position(start_time.elapsed().as_secs().min(planned_runtime.as_secs()));
                pb.set_message(format!("{} VUs", active_vus()));
                std::thread::sleep(Duration::from_millis(500));
            }
        })?;

    Ok(())
}
