use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The two result vocabularies in play: script probes report
/// `"Healthy"`/`"Unhealthy"`, built-in sensors report `"true"`/`"false"`
/// (where `"true"` means pressure present). Both are carried as plain
/// strings on the wire — preserve the contract verbatim.
pub const RESULT_HEALTHY: &str = "Healthy";
pub const RESULT_UNHEALTHY: &str = "Unhealthy";
pub const RESULT_PRESSURE: &str = "true";
pub const RESULT_NO_PRESSURE: &str = "false";

pub const SENSOR_CPU: &str = "CPUUnderPressure";
pub const SENSOR_MEMORY: &str = "MemoryUnderPressure";
pub const SENSOR_DISK: &str = "DiskUsageHigh";

/// The result of one probe or sensor evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthCheck {
    #[serde(rename = "type")]
    pub check_type: String,
    pub result: String,
    pub message: String,
    pub last_run: DateTime<Utc>,
}

impl HealthCheck {
    #[must_use]
    pub fn is_failing(&self) -> bool {
        self.result == RESULT_UNHEALTHY || self.result == RESULT_PRESSURE
    }
}

/// One entry of `<root>/config.json`: a probe to run on every cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    #[serde(rename = "type")]
    pub check_type: String,
    pub health_check: String,
}

/// One rule inside a log-watcher config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogWatcherRule {
    pub name: String,
    pub pattern: String,
}

/// A log-watcher config file: `{source, syslog_identifier, rules}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogWatcherConfig {
    pub source: String,
    pub syslog_identifier: String,
    pub rules: Vec<LogWatcherRule>,
}

/// A single node as reported by the cluster manager's node list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeListing {
    #[serde(rename = "ID")]
    pub id: String,
    pub address: String,
    pub datacenter: String,
    pub scheduling_eligibility: String,
    #[serde(default)]
    pub attributes: std::collections::HashMap<String, String>,
}

impl NodeListing {
    #[must_use]
    pub fn is_eligible(&self) -> bool {
        self.scheduling_eligibility == "eligible"
    }
}

/// Detail fetched per-node via `nodeInfo(id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeInfo {
    pub datacenter: String,
    #[serde(default)]
    pub attributes: std::collections::HashMap<String, String>,
}
