use std::time::Duration;

use chrono::Utc;
use sysinfo::{Disks, System};

use crate::types::{
    HealthCheck, RESULT_NO_PRESSURE, RESULT_PRESSURE, SENSOR_CPU, SENSOR_DISK, SENSOR_MEMORY,
};

/// Thresholds for the three built-in pressure sensors, as floating-point
/// percentages parsed from CLI flags at startup.
#[derive(Debug, Clone, Copy)]
pub struct SensorLimits {
    pub cpu_limit: f64,
    pub memory_limit: f64,
    pub disk_limit: f64,
}

fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}

/// Sample total (non-idle) CPU usage at two instants one second apart
/// and report pressure if that percentage of the elapsed window meets
/// the limit. `sysinfo` exposes only the aggregate non-idle figure, not
/// a user/system breakdown, so this stands in for the original's
/// separate "user" counter — see the CPU sensor note in the design
/// ledger.
pub async fn sample_cpu(limit: f64) -> HealthCheck {
    let result = tokio::task::spawn_blocking(move || {
        let mut sys = System::new();
        sys.refresh_cpu_usage();
        std::thread::sleep(Duration::from_secs(1));
        sys.refresh_cpu_usage();
        f64::from(sys.global_cpu_usage())
    })
    .await;

    let now = Utc::now();
    match result {
        Ok(cpu_pct) => {
            let pressure = cpu_pct >= limit;
            HealthCheck {
                check_type: SENSOR_CPU.to_string(),
                result: if pressure {
                    RESULT_PRESSURE.to_string()
                } else {
                    RESULT_NO_PRESSURE.to_string()
                },
                message: format!("CPU usage: {cpu_pct:.2} %"),
                last_run: now,
            }
        }
        // fail-closed: treat sensor failure as pressure.
        Err(join_err) => HealthCheck {
            check_type: SENSOR_CPU.to_string(),
            result: RESULT_PRESSURE.to_string(),
            message: join_err.to_string(),
            last_run: now,
        },
    }
}

pub fn sample_memory(limit: f64) -> HealthCheck {
    let mut sys = System::new();
    sys.refresh_memory();
    let total = sys.total_memory();
    let now = Utc::now();

    if total == 0 {
        return HealthCheck {
            check_type: SENSOR_MEMORY.to_string(),
            result: RESULT_PRESSURE.to_string(),
            message: "unable to read total memory".to_string(),
            last_run: now,
        };
    }

    let available = sys.available_memory();
    let available_pct = (available as f64 / total as f64) * 100.0;
    let pressure = available_pct <= (100.0 - limit);

    HealthCheck {
        check_type: SENSOR_MEMORY.to_string(),
        result: if pressure {
            RESULT_PRESSURE.to_string()
        } else {
            RESULT_NO_PRESSURE.to_string()
        },
        message: format!(
            "available: {} / total: {}",
            human_bytes(available),
            human_bytes(total)
        ),
        last_run: now,
    }
}

pub fn sample_disk(limit: f64) -> HealthCheck {
    let disks = Disks::new_with_refreshed_list();
    let now = Utc::now();

    let root = disks
        .list()
        .iter()
        .find(|d| d.mount_point().as_os_str() == "/");

    let Some(root) = root else {
        return HealthCheck {
            check_type: SENSOR_DISK.to_string(),
            result: RESULT_PRESSURE.to_string(),
            message: "root (/) mountpoint not found".to_string(),
            last_run: now,
        };
    };

    let total = root.total_space();
    let available = root.available_space();
    let used_pct = if total == 0 {
        0.0
    } else {
        ((total - available) as f64 / total as f64) * 100.0
    };
    let used_pct = if used_pct.is_nan() { 0.0 } else { used_pct };
    let pressure = used_pct >= limit;

    HealthCheck {
        check_type: SENSOR_DISK.to_string(),
        result: if pressure {
            RESULT_PRESSURE.to_string()
        } else {
            RESULT_NO_PRESSURE.to_string()
        },
        message: format!("disk usage: {used_pct:.2} %"),
        last_run: now,
    }
}
