use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "nnpd")]
#[command(about = "Nomad node-health pipeline: detector and aggregator", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the per-node health Detector.
    Detector(DetectorArgs),
    /// Run the cluster-wide Aggregator.
    Aggregator(AggregatorArgs),
    /// Config file generation and probe-bundle packaging helpers.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Args, Debug)]
pub struct DetectorArgs {
    #[arg(long, env = "DETECTOR_PORT", default_value = ":8083")]
    pub port: String,

    #[arg(long, env = "DETECTOR_CYCLE_TIME", default_value = "3s")]
    pub detector_cycle_time: humantime::Duration,

    #[arg(long, env = "DETECTOR_ROOT_DIR", default_value = "/var/lib/nnpd")]
    pub root_dir: String,

    #[arg(long, env = "CPU_LIMIT", default_value = "85")]
    pub cpu_limit: f64,

    #[arg(long, env = "MEMORY_LIMIT", default_value = "80")]
    pub memory_limit: f64,

    #[arg(long, env = "DISK_LIMIT", default_value = "90")]
    pub disk_limit: f64,

    #[arg(long, env = "DETECTOR_AUTH", default_value = "false")]
    pub auth: bool,

    /// Path to a log-watcher config file; may be repeated.
    #[arg(long = "log-monitor")]
    pub log_monitor: Vec<String>,
}

#[derive(Args, Debug)]
pub struct AggregatorArgs {
    #[arg(long, env = "NOMAD_SERVER", default_value = "http://localhost:4646")]
    pub nomad_server: String,

    #[arg(long, env = "AGGREGATION_CYCLE_TIME", default_value = "15s")]
    pub aggregation_cycle_time: humantime::Duration,

    #[arg(long, env = "AGGREGATOR_DETECTOR_PORT", default_value = ":8083")]
    pub detector_port: String,

    /// Datacenter to include; may be repeated. The aggregator's own
    /// `NOMAD_DC` is always implicitly included.
    #[arg(long = "detector-datacenter")]
    pub detector_datacenter: Vec<String>,

    /// `key=value` attribute filter; may be repeated.
    #[arg(long = "node-attribute")]
    pub node_attribute: Vec<String>,

    /// Health-check type whose failure is allowed to cause eligibility
    /// removal; may be repeated.
    #[arg(long = "enforce-health-check")]
    pub enforce_health_check: Vec<String>,

    #[arg(long, env = "THRESHOLD_PERCENTAGE", default_value = "85")]
    pub threshold_percentage: f64,

    #[arg(long, env = "PROMETHEUS_SERVER_ADDR", default_value = "0.0.0.0")]
    pub prometheus_server_addr: String,

    #[arg(long, env = "PROMETHEUS_SERVER_PORT", default_value = "3000")]
    pub prometheus_server_port: u16,

    #[arg(long, env = "AGGREGATOR_DEBUG", default_value = "false")]
    pub debug: bool,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Generate `<root-dir>/config.json` from the directory layout.
    Generate {
        #[arg(long = "root-dir", short = 'd')]
        root_dir: Option<String>,
    },
    /// Package probe scripts into a container image (not implemented).
    Build {
        #[arg(long = "root-dir", short = 'd')]
        root_dir: Option<String>,
        #[arg(long)]
        image: String,
    },
}
