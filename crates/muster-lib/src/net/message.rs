use serde::{Deserialize, Serialize};

use crate::session::Status;
use crate::RequestId;

use super::ProtocolError;

/// Wire frames exchanged between a dedicated-server agent and the pool.
///
/// A single enum covers both directions; each variant documents who sends
/// it.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub enum Message {
    /// First frame sent by the agent once the socket is open.
    Connect {
        version: String,
        credentials: Credentials,
    },
    /// Pool's answer to `Connect`. `server_pool` names the pool hosted on
    /// this channel; `None` means the agent reached a plain client scene
    /// and the pool RPC surface is not available.
    ConnectAccept { server_pool: Option<String> },
    ConnectReject { error: ProtocolError },
    /// `WaitGameSession` travels agent to pool, `GetStatus` pool to agent.
    Request { id: RequestId, request: Request },
    Response {
        id: RequestId,
        result: Result<Response, ProtocolError>,
    },
    /// Fire-and-forget, pool to agent.
    Event(Event),
}

/// Identity an agent presents to the cluster's authenticator.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Authenticated dedicated game server.
    GameServer { token: String },
    /// Unauthenticated development fallback.
    GameServerDev,
}

impl Credentials {
    /// Identity tag as understood by the cluster's authenticator.
    pub fn kind(&self) -> &'static str {
        match self {
            Credentials::GameServer { .. } => "gameServer",
            Credentials::GameServerDev => "gameServer.dev",
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// Suspends until the pool assigns a game session to this server.
    WaitGameSession,
    /// Probe for the server's current lifecycle status.
    GetStatus,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub enum Response {
    Status(Status),
    /// An encoded `GameSessionStartupParameters<T>`. The agent decodes the
    /// payload against its own parameter type.
    GameSession { params: Vec<u8> },
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// The pool is decommissioning this server.
    Shutdown,
}
