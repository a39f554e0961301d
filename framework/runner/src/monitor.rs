use std::time::{Duration, Instant};

use surge_core::prelude::DelegatedShutdownListener;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

const HIGH_CPU_PERCENT: f32 = 80.0;
const WARN_INTERVAL: Duration = Duration::from_secs(10);

/// Monitor the CPU usage of the load generator and warn when it is high.
///
/// A saturated load generator cannot keep its VUs on schedule, so latencies measured while this
/// warning is logged may be inflated. The run is not stopped. Usage is sampled every
/// [sysinfo::MINIMUM_CPU_UPDATE_INTERVAL] and warnings are logged at most every [WARN_INTERVAL].
pub(crate) fn start_monitor(mut shutdown_listener: DelegatedShutdownListener) -> anyhow::Result<()> {
    std::thread::Builder::new()
        .name("monitor".to_string())
        .spawn(move || {
            let this_process_pid = Pid::from_u32(std::process::id());
            let mut sys = System::new();

            sys.refresh_cpu_all();
            let cpu_count = sys.cpus().len().max(1);
            let mut last_warning: Option<Instant> = None;

            loop {
                if shutdown_listener.should_shutdown() {
                    break;
                }

                sys.refresh_processes_specifics(
                    ProcessesToUpdate::Some(&[this_process_pid]),
                    true,
                    ProcessRefreshKind::nothing().with_cpu(),
                );

                let Some(process) = sys.process(this_process_pid) else {
                    log::warn!("Resource monitor could not read process info, stopping");
                    break;
                };

                let usage = process.cpu_usage() / cpu_count as f32;
                if usage > HIGH_CPU_PERCENT
                    && !last_warning.is_some_and(|at| at.elapsed() < WARN_INTERVAL)
                {
                    log::warn!(
                        "High CPU usage detected. Surge is using {usage:.2}% of the CPU, with {cpu_count} available cores. Latency results may be skewed"
                    );
                    last_warning = Some(Instant::now());
                }

                std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL.max(Duration::from_millis(500)));
            }
        })?;

    Ok(())
}
