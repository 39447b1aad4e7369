use std::path::Path;

use regex::Regex;

use crate::error::{Error, Result};
use crate::types::{LogWatcherConfig, ProbeConfig};

/// Load `<root>/config.json`: the list of probes run every detector cycle.
pub fn load_probe_configs(root: &Path) -> Result<Vec<ProbeConfig>> {
    let path = root.join("config.json");
    let bytes = std::fs::read(&path)?;
    let probes: Vec<ProbeConfig> = serde_json::from_slice(&bytes)?;
    Ok(probes)
}

pub fn load_log_watcher_config(path: &Path) -> Result<LogWatcherConfig> {
    let bytes = std::fs::read(path)?;
    let config: LogWatcherConfig = serde_json::from_slice(&bytes)?;
    Ok(config)
}

/// A log-watcher rule with its pattern already compiled. Invalid
/// patterns are a fatal startup error.
pub struct CompiledRule {
    pub name: String,
    pub pattern: Regex,
}

pub fn compile_rules(config: &LogWatcherConfig) -> Result<Vec<CompiledRule>> {
    config
        .rules
        .iter()
        .map(|rule| {
            Regex::new(&rule.pattern)
                .map(|pattern| CompiledRule {
                    name: rule.name.clone(),
                    pattern,
                })
                .map_err(|source| Error::InvalidPattern {
                    pattern: rule.pattern.clone(),
                    source,
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn loads_probe_config_list() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.json"),
            r#"[{"type":"docker","health_check":"docker_health_check.sh"}]"#,
        )
        .unwrap();
        let probes = load_probe_configs(dir.path()).unwrap();
        assert_eq!(probes.len(), 1);
        assert_eq!(probes[0].check_type, "docker");
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        let config = LogWatcherConfig {
            source: "journald".to_string(),
            syslog_identifier: "kernel".to_string(),
            rules: vec![crate::types::LogWatcherRule {
                name: "oom".to_string(),
                pattern: "(unclosed".to_string(),
            }],
        };
        assert!(compile_rules(&config).is_err());
    }
}
