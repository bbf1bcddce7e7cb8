use muster_lib::net::Credentials;

use crate::config::AgentConfig;

/// Picks the identity this agent presents to the cluster's authenticator.
///
/// Deterministic given the configuration, and recomputed on every
/// connection attempt so a reconfigured token takes effect on reconnect.
pub fn select_credentials(config: &AgentConfig) -> Credentials {
    match config.auth_token.as_deref() {
        Some(token) if !token.is_empty() => {
            tracing::info!("auth token found, authenticating as a game server");
            Credentials::GameServer {
                token: token.to_owned(),
            }
        }
        _ => {
            tracing::warn!(
                "no auth token found, connecting as an unauthenticated development game server"
            );
            Credentials::GameServerDev
        }
    }
}
