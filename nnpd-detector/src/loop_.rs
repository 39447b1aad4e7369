use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use nnpd_core::probe::run_probe;
use nnpd_core::registry::VerdictRegistry;
use nnpd_core::sensors::{sample_cpu, sample_disk, sample_memory, SensorLimits};
use nnpd_core::types::ProbeConfig;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Runs until `cancel` fires. One iteration: barrier-join every
/// configured probe, then run the three sensors sequentially, then
/// (on the first iteration) flip `ready`.
pub async fn run_detector_loop(
    root: PathBuf,
    probes: Vec<ProbeConfig>,
    limits: SensorLimits,
    registry: VerdictRegistry,
    ready: Arc<AtomicBool>,
    cycle: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(cycle);
    // the first tick fires immediately; we want the cycle to run right away too.
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                info!("detector loop cancelled");
                return;
            }
            _ = interval.tick() => {
                run_cycle(&root, &probes, limits, &registry).await;
                if !ready.load(Ordering::Relaxed) {
                    ready.store(true, Ordering::Relaxed);
                    info!("detector loop completed first cycle, now ready");
                }
            }
        }
    }
}

async fn run_cycle(root: &PathBuf, probes: &[ProbeConfig], limits: SensorLimits, registry: &VerdictRegistry) {
    // Step 1: barrier-join every probe task.
    let handles: Vec<_> = probes
        .iter()
        .cloned()
        .map(|probe| {
            let root = root.clone();
            let registry = registry.clone();
            tokio::spawn(async move {
                let verdict = run_probe(&root, &probe).await;
                registry.put(verdict).await;
            })
        })
        .collect();
    for handle in handles {
        if let Err(err) = handle.await {
            warn!(error = %err, "probe task panicked");
        }
    }

    // Step 2: sequentially run the three resource sensors.
    let cpu = sample_cpu(limits.cpu_limit).await;
    registry.put(cpu).await;
    let memory = sample_memory(limits.memory_limit);
    registry.put(memory).await;
    let disk = sample_disk(limits.disk_limit);
    registry.put(disk).await;

    crate::metrics::REGISTERED_VERDICTS.set(registry.len().await as i64);
}

#[cfg(test)]
mod tests {
    use super::*;
    use nnpd_core::types::SENSOR_CPU;
    use std::sync::atomic::AtomicBool;

    #[tokio::test]
    async fn first_cycle_flips_ready_and_publishes_sensors() {
        let registry = VerdictRegistry::new();
        let ready = Arc::new(AtomicBool::new(false));
        let limits = SensorLimits {
            cpu_limit: 1_000_000.0,
            memory_limit: -1_000_000.0,
            disk_limit: 1_000_000.0,
        };

        run_cycle(&PathBuf::from("/nonexistent"), &[], limits, &registry).await;
        ready.store(true, Ordering::Relaxed);

        let snapshot = registry.snapshot().await;
        assert!(snapshot.iter().any(|v| v.check_type == SENSOR_CPU));
        assert!(ready.load(Ordering::Relaxed));
    }
}
