use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use base64::{engine::general_purpose::STANDARD, Engine};
use nnpd_core::types::HealthCheck;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::client::ClusterManagerClient;
use crate::filter::NodeFilter;
use crate::metrics;
use crate::pause::PauseController;

pub struct AggregatorConfig {
    pub own_dc: String,
    pub detector_port: String,
    pub enforce_health_check: HashSet<String>,
    pub threshold_percentage: f64,
    pub cycle_time: Duration,
    pub filter: NodeFilter,
    /// `DETECTOR_HTTP_TOKEN`; sent as `Authorization: Basic <base64>` on
    /// every outbound detector request when the detector fleet runs with
    /// `--auth`.
    pub detector_auth_token: Option<String>,
}

/// The full verdict vector observed for a node in the previous cycle,
/// indexed by check type. Empty means "node not seen before".
type VerdictVector = HashMap<String, HealthCheck>;

pub async fn run_aggregator_loop(
    config: AggregatorConfig,
    cluster: ClusterManagerClient,
    detector_http: reqwest::Client,
    pause: PauseController,
    cancel: CancellationToken,
) {
    let mut previous: HashMap<String, VerdictVector> = HashMap::new();
    let mut interval = tokio::time::interval(config.cycle_time);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                info!("aggregator loop cancelled");
                return;
            }
            _ = interval.tick() => {
                if pause.is_paused() {
                    info!("aggregator loop paused, skipping cycle");
                    continue;
                }
                run_cycle(&config, &cluster, &detector_http, &mut previous).await;
            }
        }
    }
}

async fn run_cycle(
    config: &AggregatorConfig,
    cluster: &ClusterManagerClient,
    detector_http: &reqwest::Client,
    previous: &mut HashMap<String, VerdictVector>,
) {
    let started = Instant::now();
    metrics::AGGREGATOR_CYCLES_TOTAL.with_label_values(&[&config.own_dc]).inc();

    let nodes = match cluster.list_nodes().await {
        Ok(nodes) => nodes,
        Err(err) => {
            warn!(error = %err, "failed to list nodes, retrying next cycle");
            return;
        }
    };

    let total_node_count = nodes.len() as f64;
    let mut eligible_node_count = nodes.iter().filter(|n| n.is_eligible()).count() as f64;

    metrics::NODES_TOTAL.with_label_values(&[&config.own_dc]).set(total_node_count);
    metrics::NODES_ELIGIBLE
        .with_label_values(&[&config.own_dc])
        .set(eligible_node_count);

    for node in &nodes {
        let info = match cluster.node_info(&node.id).await {
            Ok(info) => info,
            Err(err) => {
                warn!(node = %node.id, error = %err, "failed to fetch node info, skipping");
                metrics::NODE_HANDLE_ERRORS.with_label_values(&[&config.own_dc]).inc();
                continue;
            }
        };

        if !config.filter.matches(&info) {
            metrics::NODE_HANDLE_SKIPS.with_label_values(&[&config.own_dc]).inc();
            continue;
        }

        let detector_base = detector_base_url(&node.address, &config.detector_port);
        if !detector_is_active(detector_http, &detector_base, config.detector_auth_token.as_deref()).await {
            warn!(node = %node.id, "detector inactive, skipping");
            metrics::NODE_HANDLE_SKIPS.with_label_values(&[&config.own_dc]).inc();
            continue;
        }

        let current = match fetch_nodehealth(detector_http, &detector_base, config.detector_auth_token.as_deref()).await {
            Ok(verdicts) => verdicts,
            Err(err) => {
                warn!(node = %node.id, error = %err, "failed to pull nodehealth, skipping");
                metrics::NODE_HANDLE_ERRORS.with_label_values(&[&config.own_dc]).inc();
                continue;
            }
        };
        let current_map: VerdictVector = current
            .into_iter()
            .map(|verdict| (verdict.check_type.clone(), verdict))
            .collect();

        let previous_map = previous.get(&node.id);

        let node_healthy = !current_map.values().any(HealthCheck::is_failing);
        let toggle_candidate = current_map
            .values()
            .any(|v| v.is_failing() && config.enforce_health_check.contains(&v.check_type));
        let state_changed = match previous_map {
            Some(prev) => prev.iter().any(|(check_type, prev_verdict)| {
                current_map
                    .get(check_type)
                    .is_some_and(|cur| cur.result != prev_verdict.result)
            }),
            None => false,
        };

        if !node_healthy {
            metrics::NODE_UNHEALTHY.with_label_values(&[&config.own_dc]).inc();
            if !toggle_candidate {
                info!(node = %node.id, "failing health check is not in enforce-health-check, dry-runned");
            }
        } else {
            metrics::NODE_HEALTHY.with_label_values(&[&config.own_dc]).inc();
        }
        if state_changed {
            metrics::NODE_HEALTH_STATE_CHANGES.with_label_values(&[&config.own_dc]).inc();
        }
        let above_threshold =
            (eligible_node_count / total_node_count.max(1.0)) * 100.0 > config.threshold_percentage;
        let toggle = toggle_candidate && above_threshold;

        if previous_map.is_none() {
            if !node_healthy && toggle {
                if cluster.toggle_eligibility(&node.id, false).await.is_ok() {
                    eligible_node_count -= 1.0;
                }
            }
        } else if state_changed {
            if node_healthy {
                if cluster.toggle_eligibility(&node.id, true).await.is_ok() {
                    eligible_node_count += 1.0;
                }
            } else if toggle && cluster.toggle_eligibility(&node.id, false).await.is_ok() {
                eligible_node_count -= 1.0;
            }
        }

        previous.insert(node.id.clone(), current_map);
    }

    metrics::AGGREGATOR_PROCESSING_TIME
        .with_label_values(&[&config.own_dc])
        .set(started.elapsed().as_secs_f64());
}

/// `Authorization: Basic <base64(token)>`, matching the detector's own
/// `require_auth` encoding.
fn basic_auth_header(token: &str) -> String {
    format!("Basic {}", STANDARD.encode(token))
}

/// `":8083"` appends directly to the node's address; a bare port number
/// (e.g. `"8083"`) is colon-prefixed first. Mirrors the detector's own
/// `to_bind_addr` normalization on the binding side.
fn detector_base_url(address: &str, port: &str) -> String {
    if let Some(stripped) = port.strip_prefix(':') {
        format!("http://{address}:{stripped}")
    } else {
        format!("http://{address}:{port}")
    }
}

async fn detector_is_active(client: &reqwest::Client, detector_base: &str, auth_token: Option<&str>) -> bool {
    let url = format!("{detector_base}/v1/health/");
    let mut request = client.post(url);
    if let Some(token) = auth_token {
        request = request.header(reqwest::header::AUTHORIZATION, basic_auth_header(token));
    }
    match request.send().await {
        Ok(response) => response.status().is_success(),
        Err(_) => false,
    }
}

async fn fetch_nodehealth(
    client: &reqwest::Client,
    detector_base: &str,
    auth_token: Option<&str>,
) -> Result<Vec<HealthCheck>, reqwest::Error> {
    let url = format!("{detector_base}/v1/nodehealth/");
    let mut request = client.post(url);
    if let Some(token) = auth_token {
        request = request.header(reqwest::header::AUTHORIZATION, basic_auth_header(token));
    }
    request.send().await?.json().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::NodeFilter;
    use chrono::Utc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn verdict(check_type: &str, result: &str) -> HealthCheck {
        HealthCheck {
            check_type: check_type.to_string(),
            result: result.to_string(),
            message: String::new(),
            last_run: Utc::now(),
        }
    }

    fn config(threshold: f64) -> AggregatorConfig {
        AggregatorConfig {
            own_dc: "dc1".to_string(),
            detector_port: String::new(),
            enforce_health_check: ["docker".to_string()].into_iter().collect(),
            threshold_percentage: threshold,
            cycle_time: Duration::from_secs(15),
            filter: NodeFilter::new(vec!["dc1".to_string()], "dc1", vec![]),
            detector_auth_token: None,
        }
    }

    #[tokio::test]
    async fn s1_unhealthy_node_toggled_ineligible_above_threshold() {
        let cluster = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/nodes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"ID": "n1", "address": "127.0.0.1", "datacenter": "dc1", "scheduling_eligibility": "eligible", "attributes": {}},
                {"ID": "n2", "address": "127.0.0.1:1", "datacenter": "dc1", "scheduling_eligibility": "eligible", "attributes": {}},
            ])))
            .mount(&cluster)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/node/n1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"datacenter": "dc1", "attributes": {}})))
            .mount(&cluster)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/health/"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&cluster)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/nodehealth/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(vec![verdict("docker", "Unhealthy")]))
            .mount(&cluster)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/node/n1/eligibility"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&cluster)
            .await;

        let client = ClusterManagerClient::new(cluster.uri(), true).unwrap();
        let mut config = config(50.0);
        config.filter = NodeFilter::new(vec!["dc1".to_string()], "dc1", vec![]);
        config.detector_port = format!(":{}", cluster.address().port());
        let mut previous = HashMap::new();
        run_cycle(&config, &client, &reqwest::Client::new(), &mut previous).await;

        assert!(previous.contains_key("n1"));
    }

    #[tokio::test]
    async fn s2_capacity_gate_denies_toggle_at_threshold() {
        // 1 of 2 nodes already ineligible, threshold 50: 50 > 50 is false.
        let total = 2.0_f64;
        let eligible = 1.0_f64;
        let above_threshold = (eligible / total) * 100.0 > 50.0;
        assert!(!above_threshold);
    }

    #[test]
    fn detector_base_url_accepts_colon_prefixed_and_bare_ports() {
        assert_eq!(detector_base_url("10.0.0.1", ":8083"), "http://10.0.0.1:8083");
        assert_eq!(detector_base_url("10.0.0.1", "8083"), "http://10.0.0.1:8083");
    }

    #[tokio::test]
    async fn detector_requests_carry_the_basic_auth_header() {
        let detector = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/health/"))
            .and(wiremock::matchers::header("authorization", "Basic c2VjcmV0"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&detector)
            .await;

        let active = detector_is_active(&reqwest::Client::new(), &detector.uri(), Some("secret")).await;
        assert!(active);
    }

    #[tokio::test]
    async fn detector_requests_without_a_token_omit_the_header() {
        let detector = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/health/"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&detector)
            .await;

        let active = detector_is_active(&reqwest::Client::new(), &detector.uri(), None).await;
        assert!(active);
    }
}
