use std::collections::HashSet;

use nnpd_core::types::NodeInfo;

/// Selects nodes by datacenter membership and attribute equalities.
pub struct NodeFilter {
    /// The aggregator's own `NOMAD_DC` is implicitly added to this set.
    datacenters: HashSet<String>,
    attributes: Vec<(String, String)>,
}

impl NodeFilter {
    #[must_use]
    pub fn new(mut datacenters: Vec<String>, own_dc: &str, attributes: Vec<(String, String)>) -> Self {
        datacenters.push(own_dc.to_string());
        Self {
            datacenters: datacenters.into_iter().collect(),
            attributes,
        }
    }

    /// Skip if any configured `key=value` pair is missing or mismatched,
    /// or if the node's datacenter is outside the configured set. The
    /// set always contains at least the aggregator's own datacenter.
    #[must_use]
    pub fn matches(&self, info: &NodeInfo) -> bool {
        if !self.datacenters.contains(&info.datacenter) {
            return false;
        }
        self.attributes
            .iter()
            .all(|(key, value)| info.attributes.get(key) == Some(value))
    }
}

/// Parse a repeatable `--node-attribute key=value` flag value.
pub fn parse_attribute(raw: &str) -> Option<(String, String)> {
    let (key, value) = raw.split_once('=')?;
    Some((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(dc: &str, attrs: &[(&str, &str)]) -> NodeInfo {
        NodeInfo {
            datacenter: dc.to_string(),
            attributes: attrs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        }
    }

    #[test]
    fn matches_own_dc_implicitly() {
        let filter = NodeFilter::new(vec![], "dc1", vec![]);
        assert!(filter.matches(&info("dc1", &[])));
        assert!(!filter.matches(&info("dc2", &[])));
    }

    #[test]
    fn rejects_missing_attribute() {
        let filter = NodeFilter::new(vec!["dc1".into()], "dc1", vec![("rack".into(), "a".into())]);
        assert!(!filter.matches(&info("dc1", &[])));
        assert!(filter.matches(&info("dc1", &[("rack", "a")])));
    }

    #[test]
    fn rejects_mismatched_attribute_value() {
        let filter = NodeFilter::new(vec!["dc1".into()], "dc1", vec![("rack".into(), "a".into())]);
        assert!(!filter.matches(&info("dc1", &[("rack", "b")])));
    }

    #[test]
    fn parse_attribute_splits_on_equals() {
        assert_eq!(parse_attribute("rack=a"), Some(("rack".to_string(), "a".to_string())));
        assert_eq!(parse_attribute("no-equals-sign"), None);
    }
}
