use std::path::Path;

use chrono::Utc;
use tokio::process::Command;

use crate::types::{HealthCheck, ProbeConfig, RESULT_HEALTHY, RESULT_UNHEALTHY};

/// Execute `<root>/<type>/<health_check>` with no arguments and
/// classify the outcome. Fire-and-forget: no retries within a cycle.
pub async fn run_probe(root: &Path, probe: &ProbeConfig) -> HealthCheck {
    let path = root.join(&probe.check_type).join(&probe.health_check);

    // `Command` inherits the parent's environment by default and nothing
    // here adds to it, so the probe never sees more than what this
    // process already has exported.
    let output = Command::new(&path).output().await;

    let now = Utc::now();
    match output {
        Ok(output) if output.status.success() => HealthCheck {
            check_type: probe.check_type.clone(),
            result: RESULT_HEALTHY.to_string(),
            message: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            last_run: now,
        },
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            HealthCheck {
                check_type: probe.check_type.clone(),
                result: RESULT_UNHEALTHY.to_string(),
                message: format!("{}: {}", output.status, stderr.trim()),
                last_run: now,
            }
        }
        Err(err) => HealthCheck {
            check_type: probe.check_type.clone(),
            result: RESULT_UNHEALTHY.to_string(),
            message: format!("exec failed: {err}"),
            last_run: now,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    fn write_script(dir: &Path, check_type: &str, name: &str, body: &str) {
        let type_dir = dir.join(check_type);
        fs::create_dir_all(&type_dir).unwrap();
        let script_path = type_dir.join(name);
        fs::write(&script_path, body).unwrap();
        let mut perms = fs::metadata(&script_path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&script_path, perms).unwrap();
    }

    #[tokio::test]
    async fn exit_zero_is_healthy() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), "docker", "check.sh", "#!/bin/sh\necho ok\nexit 0\n");

        let probe = ProbeConfig {
            check_type: "docker".to_string(),
            health_check: "check.sh".to_string(),
        };
        let verdict = run_probe(dir.path(), &probe).await;
        assert_eq!(verdict.result, RESULT_HEALTHY);
        assert_eq!(verdict.message, "ok");
    }

    #[tokio::test]
    async fn nonzero_exit_is_unhealthy_with_stderr() {
        let dir = tempfile::tempdir().unwrap();
        write_script(
            dir.path(),
            "docker",
            "check.sh",
            "#!/bin/sh\necho 'daemon down' >&2\nexit 1\n",
        );

        let probe = ProbeConfig {
            check_type: "docker".to_string(),
            health_check: "check.sh".to_string(),
        };
        let verdict = run_probe(dir.path(), &probe).await;
        assert_eq!(verdict.result, RESULT_UNHEALTHY);
        assert!(verdict.message.contains("daemon down"));
    }

    #[tokio::test]
    async fn missing_executable_is_unhealthy() {
        let dir = tempfile::tempdir().unwrap();
        let probe = ProbeConfig {
            check_type: "missing".to_string(),
            health_check: "nope.sh".to_string(),
        };
        let verdict = run_probe(dir.path(), &probe).await;
        assert_eq!(verdict.result, RESULT_UNHEALTHY);
    }
}
