use serde::{Deserialize, Serialize};
use te_sdn_identity::FlowedConnection;
use te_sdn_stats::RouteWeigher;

pub const DEFAULT_MAX_ALTERNATE_ROUTES: usize = 3;
pub const DEFAULT_ALL_ROUTES_LIMIT: usize = 1024;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct RoutingConfig {
    /// Weighting used to select the active route of every connection
    pub strategy: RouteWeigher,
    /// Number of routes returned by alternate route queries
    pub max_alternate_routes: usize,
    /// Cap on the exhaustive route enumeration
    pub all_routes_limit: usize,
    /// Connections whose routes are logged in full when installed or replaced
    pub printable_connections: Vec<FlowedConnection>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            strategy: RouteWeigher::default(),
            max_alternate_routes: DEFAULT_MAX_ALTERNATE_ROUTES,
            all_routes_limit: DEFAULT_ALL_ROUTES_LIMIT,
            printable_connections: vec![],
        }
    }
}

impl RoutingConfig {
    pub fn is_printable(&self, connection: &FlowedConnection) -> bool {
        self.printable_connections.contains(connection)
    }
}

#[cfg(test)]
mod tests {
    use te_sdn_stats::RouteWeigher;

    use super::RoutingConfig;

    #[test]
    fn missing_fields_use_defaults() {
        let config: RoutingConfig = serde_json::from_str(r#"{"strategy":"min_latency"}"#).expect("should parse");
        assert_eq!(config.strategy, RouteWeigher::MinLatency);
        assert_eq!(config.max_alternate_routes, 3);
        assert_eq!(config.all_routes_limit, 1024);
        assert!(config.printable_connections.is_empty());
    }
}
