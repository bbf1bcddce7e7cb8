use std::env;

/// Comma separated list of endpoints the server should use to reach the
/// cluster.
pub const ENV_CLUSTER_ENDPOINTS: &str = "MUSTER_CLUSTER_ENDPOINTS";
/// The local port the server's game transport should bind to.
pub const ENV_SERVER_PORT: &str = "MUSTER_SERVER_PORT";
/// Comma separated list of public addresses players can use to reach this
/// server.
pub const ENV_PUBLISHED_ADDRESSES: &str = "MUSTER_PUBLISHED_ADDRESSES";
/// The public port mapped to the port the server is bound to.
pub const ENV_PUBLISHED_PORT: &str = "MUSTER_PUBLISHED_PORT";
/// Cluster authentication token.
pub const ENV_AUTH_TOKEN: &str = "MUSTER_AUTH_TOKEN";

/// Connection parameters for a dedicated server joining a cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    /// Cluster endpoints, tried in order until one accepts.
    pub cluster_endpoints: Vec<String>,
    /// Local port the server's own game transport binds to.
    pub port: u16,
    /// Public addresses players can use to reach this server directly.
    pub published_addresses: Vec<String>,
    /// Public port mapped to `port`.
    pub published_port: Option<u16>,
    /// Cleared when published addresses make the server directly reachable.
    pub enable_nat_traversal: bool,
    /// Cluster authentication token. Absent or empty means the server runs
    /// as an unauthenticated development game server.
    pub auth_token: Option<String>,
    /// Opt-in: let [`AgentConfig::apply_env`] overwrite this config from
    /// environment variables.
    pub parameters_from_env: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            cluster_endpoints: Vec::new(),
            port: 0,
            published_addresses: Vec::new(),
            published_port: None,
            enable_nat_traversal: true,
            auth_token: None,
            parameters_from_env: false,
        }
    }
}

impl AgentConfig {
    /// Applies environment overrides. Meant to run exactly once, before
    /// connecting; a no-op unless `parameters_from_env` is set. Malformed
    /// values are treated as unset, never as errors.
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| env::var(key).ok());
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        if !self.parameters_from_env {
            return;
        }

        if let Some(endpoints) = var(ENV_CLUSTER_ENDPOINTS) {
            self.cluster_endpoints = split_list(&endpoints);
        }

        if let Some(port) = var(ENV_SERVER_PORT).and_then(|p| p.trim().parse().ok()) {
            self.port = port;
        }

        if let Some(addresses) = var(ENV_PUBLISHED_ADDRESSES) {
            // A published address means players reach the server directly,
            // so NAT traversal is unnecessary.
            self.enable_nat_traversal = false;
            self.published_addresses = split_list(&addresses);
            self.published_port = var(ENV_PUBLISHED_PORT)
                .and_then(|p| p.trim().parse().ok())
                .or(Some(self.port));
        }

        if let Some(token) = var(ENV_AUTH_TOKEN) {
            self.auth_token = Some(token);
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}
