use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::types::HealthCheck;

/// Process-wide map of health-check type to latest verdict.
///
/// `put` and `snapshot` are the only operations; the lock is private so
/// callers can never observe or hold a half-written map.
#[derive(Debug, Clone, Default)]
pub struct VerdictRegistry {
    inner: Arc<RwLock<HashMap<String, HealthCheck>>>,
}

impl VerdictRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, verdict: HealthCheck) {
        let mut guard = self.inner.write().await;
        guard.insert(verdict.check_type.clone(), verdict);
    }

    /// Returns verdicts in arbitrary order; callers must not assume stability.
    pub async fn snapshot(&self) -> Vec<HealthCheck> {
        let guard = self.inner.read().await;
        guard.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn verdict(check_type: &str, result: &str) -> HealthCheck {
        HealthCheck {
            check_type: check_type.to_string(),
            result: result.to_string(),
            message: String::new(),
            last_run: Utc::now(),
        }
    }

    #[tokio::test]
    async fn put_then_snapshot_round_trips() {
        let registry = VerdictRegistry::new();
        registry.put(verdict("docker", "Healthy")).await;
        let snap = registry.snapshot().await;
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].check_type, "docker");
    }

    #[tokio::test]
    async fn put_overwrites_same_type() {
        let registry = VerdictRegistry::new();
        registry.put(verdict("docker", "Healthy")).await;
        registry.put(verdict("docker", "Unhealthy")).await;
        let snap = registry.snapshot().await;
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].result, "Unhealthy");
    }

    #[tokio::test]
    async fn concurrent_puts_each_land() {
        let registry = VerdictRegistry::new();
        let mut handles = Vec::new();
        for i in 0..50 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry.put(verdict(&format!("check-{i}"), "Healthy")).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(registry.len().await, 50);
    }
}
