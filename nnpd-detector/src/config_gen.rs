use std::path::Path;

use nnpd_core::error::{Error, Result};
use nnpd_core::types::ProbeConfig;
use tracing::info;

/// Walk `root_dir`'s subdirectories; each one becomes a `ProbeConfig`
/// whose `type` is the directory name and whose `health_check` is the
/// single file found inside it. Writes `<root_dir>/config.json`.
pub fn generate_config(root_dir: &Path) -> Result<()> {
    let entries = std::fs::read_dir(root_dir)?;

    let mut result = Vec::new();
    let mut directory_exists = false;

    for entry in entries {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let name = entry.file_name();
        let name = name.to_string_lossy();

        if !file_type.is_dir() || name == ".git" {
            continue;
        }
        directory_exists = true;

        let health_check_dir = root_dir.join(name.as_ref());
        let hc_files: Vec<_> = std::fs::read_dir(&health_check_dir)?.collect::<std::io::Result<_>>()?;

        if hc_files.is_empty() {
            return Err(Error::Config(format!(
                "health check missing in {} directory",
                health_check_dir.display()
            )));
        }
        if hc_files.len() > 1 {
            return Err(Error::Config(format!(
                "there should be only 1 health check present in the {} directory; use --root-dir to set a different location",
                health_check_dir.display()
            )));
        }

        result.push(ProbeConfig {
            check_type: name.to_string(),
            health_check: hc_files[0].file_name().to_string_lossy().to_string(),
        });
    }

    if !directory_exists {
        return Err(Error::Config("no health checks present under root-dir".to_string()));
    }

    let config_file_path = root_dir.join("config.json");
    let body = serde_json::to_string_pretty(&result)?;
    std::fs::write(&config_file_path, format!("{body}\n"))?;

    info!(path = %config_file_path.display(), "config file generated successfully");
    Ok(())
}

/// Packaging probe bundles into a container image is out of scope;
/// this exists only so the CLI surface is complete and fails loudly
/// rather than silently no-op'ing.
pub fn build_image(_root_dir: &Path, _image: &str) -> Result<()> {
    Err(Error::Config(
        "config build is not implemented in this build".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn generates_config_from_directory_layout() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("docker")).unwrap();
        fs::write(dir.path().join("docker/docker_health_check.sh"), "#!/bin/sh\n").unwrap();

        generate_config(dir.path()).unwrap();

        let contents = fs::read_to_string(dir.path().join("config.json")).unwrap();
        let probes: Vec<ProbeConfig> = serde_json::from_str(&contents).unwrap();
        assert_eq!(probes.len(), 1);
        assert_eq!(probes[0].check_type, "docker");
        assert_eq!(probes[0].health_check, "docker_health_check.sh");
    }

    #[test]
    fn rejects_directory_with_multiple_health_checks() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("docker")).unwrap();
        fs::write(dir.path().join("docker/one.sh"), "").unwrap();
        fs::write(dir.path().join("docker/two.sh"), "").unwrap();

        assert!(generate_config(dir.path()).is_err());
    }

    #[test]
    fn rejects_empty_health_check_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("docker")).unwrap();

        assert!(generate_config(dir.path()).is_err());
    }

    #[test]
    fn build_image_reports_unimplemented() {
        let dir = tempfile::tempdir().unwrap();
        assert!(build_image(dir.path(), "example:latest").is_err());
    }
}
