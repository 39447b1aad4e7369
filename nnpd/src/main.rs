mod cli;

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{AggregatorArgs, Cli, Command, ConfigCommand, DetectorArgs};
use nnpd_aggregator::{run_aggregator_loop, AggregatorConfig, ClusterManagerClient, PauseController};
use nnpd_aggregator::filter::{parse_attribute, NodeFilter};
use nnpd_core::config::{load_log_watcher_config, load_probe_configs};
use nnpd_core::logging::init_logging;
use nnpd_core::registry::VerdictRegistry;
use nnpd_core::sensors::SensorLimits;
use nnpd_detector::config_gen::{build_image, generate_config};
use nnpd_detector::http::DetectorState;
use nnpd_detector::log_watcher;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Detector(args) => run_detector(args).await,
        Command::Aggregator(args) => run_aggregator(args).await,
        Command::Config { command } => run_config(command),
    }
}

/// `":8083"` or a bare `"8083"` binds `0.0.0.0:8083`; an address already
/// containing a host is used as-is.
fn to_bind_addr(port: &str) -> Result<SocketAddr> {
    let raw = if let Some(stripped) = port.strip_prefix(':') {
        format!("0.0.0.0:{stripped}")
    } else if port.parse::<u16>().is_ok() {
        format!("0.0.0.0:{port}")
    } else {
        port.to_string()
    };
    raw.parse().with_context(|| format!("invalid port/address {port:?}"))
}

async fn run_detector(args: DetectorArgs) -> Result<()> {
    init_logging(false)?;
    info!("nnpd detector starting");

    // clap already rejects an unparseable --cpu-limit/--memory-limit/--disk-limit
    // at startup, matching the fatal-on-bad-config policy.
    let limits = SensorLimits {
        cpu_limit: args.cpu_limit,
        memory_limit: args.memory_limit,
        disk_limit: args.disk_limit,
    };

    let mut root_dir = PathBuf::from(&args.root_dir);
    if let Ok(alloc_dir) = std::env::var("NOMAD_ALLOC_DIR") {
        // `Path::join` discards the base entirely when the joined
        // component is absolute (true of --root-dir's default), so strip
        // the leading separator to keep the prefix.
        root_dir = PathBuf::from(alloc_dir).join(args.root_dir.trim_start_matches('/'));
    }

    let probes = load_probe_configs(&root_dir).context("loading detector config.json")?;
    info!(count = probes.len(), "loaded probe configs");

    let auth_token = if args.auth {
        Some(std::env::var("DETECTOR_HTTP_TOKEN").context("DETECTOR_HTTP_TOKEN must be set when --auth is enabled")?)
    } else {
        None
    };

    let registry = VerdictRegistry::new();
    let ready = Arc::new(AtomicBool::new(false));
    let cancel = CancellationToken::new();

    for log_monitor_path in &args.log_monitor {
        let config = load_log_watcher_config(&PathBuf::from(log_monitor_path))
            .with_context(|| format!("loading log watcher config {log_monitor_path}"))?;
        let mut rx = log_watcher::watch(config).context("starting log watcher")?;
        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                nnpd_detector::metrics::NPD_DETECTOR_LOG_PROBLEM_COUNT
                    .with_label_values(&[&message.name])
                    .inc();
                tracing::debug!(rule = %message.name, message = %message.message, "log watcher event");
            }
        });
    }

    let loop_cancel = cancel.clone();
    let loop_registry = registry.clone();
    let loop_ready = ready.clone();
    tokio::spawn(nnpd_detector::run_detector_loop(
        root_dir,
        probes,
        limits,
        loop_registry,
        loop_ready,
        args.detector_cycle_time.into(),
        loop_cancel,
    ));

    let state = DetectorState {
        registry,
        ready,
        auth_token,
    };
    let app = nnpd_detector::http::router(state);
    let addr = to_bind_addr(&args.port)?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "detector HTTP surface listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel))
        .await?;

    info!("nnpd detector shut down");
    Ok(())
}

async fn run_aggregator(args: AggregatorArgs) -> Result<()> {
    init_logging(args.debug)?;
    info!("nnpd aggregator starting");

    let own_dc = std::env::var("NOMAD_DC").context("NOMAD_DC must be set")?;

    let attributes = args
        .node_attribute
        .iter()
        .filter_map(|raw| {
            let parsed = parse_attribute(raw);
            if parsed.is_none() {
                warn!(raw, "ignoring malformed --node-attribute");
            }
            parsed
        })
        .collect();

    let filter = NodeFilter::new(args.detector_datacenter, &own_dc, attributes);
    let detector_auth_token = std::env::var("DETECTOR_HTTP_TOKEN").ok();

    let config = AggregatorConfig {
        own_dc,
        detector_port: args.detector_port,
        enforce_health_check: args.enforce_health_check.into_iter().collect::<HashSet<_>>(),
        threshold_percentage: args.threshold_percentage,
        cycle_time: args.aggregation_cycle_time.into(),
        filter,
        detector_auth_token,
    };

    let cluster = ClusterManagerClient::new(args.nomad_server, true).context("building cluster manager client")?;
    let detector_http = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .danger_accept_invalid_certs(true)
        .build()?;

    let pause = PauseController::new();
    pause.spawn_signal_handler().context("installing SIGUSR1 handler")?;

    let cancel = CancellationToken::new();
    let loop_cancel = cancel.clone();
    let loop_handle = tokio::spawn(run_aggregator_loop(config, cluster, detector_http, pause, loop_cancel));

    let metrics_router = axum::Router::new().route(
        "/metrics",
        axum::routing::get(|| async { nnpd_aggregator::metrics::gather_metrics() }),
    );
    let addr: SocketAddr = format!("{}:{}", args.prometheus_server_addr, args.prometheus_server_port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "aggregator metrics exporter listening");

    tokio::select! {
        result = axum::serve(listener, metrics_router).with_graceful_shutdown(shutdown_signal(cancel.clone())) => {
            result?;
        }
        () = cancel.cancelled() => {}
    }

    cancel.cancel();
    if let Err(err) = loop_handle.await {
        error!(error = %err, "aggregator loop task panicked");
    }

    info!("nnpd aggregator shut down");
    Ok(())
}

fn run_config(command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Generate { root_dir } => {
            let root_dir = resolve_root_dir(root_dir)?;
            generate_config(&root_dir)?;
            Ok(())
        }
        ConfigCommand::Build { root_dir, image } => {
            let root_dir = resolve_root_dir(root_dir)?;
            build_image(&root_dir, &image)?;
            Ok(())
        }
    }
}

fn resolve_root_dir(root_dir: Option<String>) -> Result<PathBuf> {
    match root_dir {
        Some(dir) => Ok(PathBuf::from(dir)),
        None => std::env::current_dir().context("determining current directory"),
    }
}

async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    cancel.cancel();
}
