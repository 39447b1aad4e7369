use std::time::Duration;

use nnpd_core::types::{NodeInfo, NodeListing};
use thiserror::Error;

const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(reqwest::StatusCode),
}

/// Thin boundary to the cluster manager: list nodes, fetch node info,
/// toggle eligibility. All operations use a 5-second timeout.
#[derive(Clone)]
pub struct ClusterManagerClient {
    base_url: String,
    http: reqwest::Client,
}

impl ClusterManagerClient {
    pub fn new(base_url: impl Into<String>, insecure_tls: bool) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(CLIENT_TIMEOUT)
            .danger_accept_invalid_certs(insecure_tls)
            .build()?;
        Ok(Self {
            base_url: base_url.into(),
            http,
        })
    }

    /// Stale reads allowed: the v1 Nomad API's `stale=true` query param.
    pub async fn list_nodes(&self) -> Result<Vec<NodeListing>, ClientError> {
        let url = format!("{}/v1/nodes?stale=true", self.base_url);
        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(ClientError::Status(response.status()));
        }
        Ok(response.json().await?)
    }

    pub async fn node_info(&self, id: &str) -> Result<NodeInfo, ClientError> {
        let url = format!("{}/v1/node/{id}", self.base_url);
        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(ClientError::Status(response.status()));
        }
        Ok(response.json().await?)
    }

    /// Idempotent; the caller is responsible for logging failures and
    /// abandoning the per-node action for this cycle.
    pub async fn toggle_eligibility(&self, id: &str, eligible: bool) -> Result<(), ClientError> {
        let url = format!("{}/v1/node/{id}/eligibility", self.base_url);
        let body = serde_json::json!({ "NodeID": id, "Eligibility": if eligible { "eligible" } else { "ineligible" } });
        let response = self.http.post(url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(ClientError::Status(response.status()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn list_nodes_parses_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/nodes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {
                    "ID": "n1",
                    "address": "10.0.0.1",
                    "datacenter": "dc1",
                    "scheduling_eligibility": "eligible",
                    "attributes": {}
                }
            ])))
            .mount(&server)
            .await;

        let client = ClusterManagerClient::new(server.uri(), true).unwrap();
        let nodes = client.list_nodes().await.unwrap();
        assert_eq!(nodes.len(), 1);
        assert!(nodes[0].is_eligible());
    }

    #[tokio::test]
    async fn toggle_eligibility_rejects_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/node/n1/eligibility"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = ClusterManagerClient::new(server.uri(), true).unwrap();
        assert!(client.toggle_eligibility("n1", false).await.is_err());
    }
}
