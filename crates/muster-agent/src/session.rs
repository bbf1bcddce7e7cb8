use std::sync::Arc;

use muster_lib::net::connection;
use muster_lib::net::{FrameError, Message, ProtocolError, Request, Response};
use muster_lib::session::{GameSessionStartupParameters, Status};
use muster_lib::PROTOCOL_VERSION;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

use crate::auth;
use crate::channel::{self, AgentError, ChannelHandle};
use crate::config::AgentConfig;
use crate::responder::{Responder, ShutdownSubscription};

/// Failure to establish a session with the cluster.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("No cluster endpoint could be reached")]
    NoEndpoint,
    #[error("Connection handshake failed: {0}")]
    Frame(FrameError),
    #[error("The pool rejected the connection: {0}")]
    Rejected(ProtocolError),
    #[error("The pool closed the connection during the handshake")]
    Disconnected,
    #[error("Unexpected handshake message from the pool")]
    InvalidHandshake,
}

impl From<FrameError> for ConnectError {
    fn from(e: FrameError) -> Self {
        Self::Frame(e)
    }
}

/// An established session between this dedicated server and the pool.
///
/// Dropping the session tears the channel down; callbacks the pool may
/// still trigger afterwards become no-ops.
pub struct PoolSession {
    channel: ChannelHandle,
    responder: Arc<Responder>,
    server_pool: Option<String>,
    driver: JoinHandle<()>,
}

impl PoolSession {
    /// Connects to the first reachable cluster endpoint and performs the
    /// credentials handshake. Credentials are re-selected from the config
    /// on every attempt.
    pub async fn connect(config: &AgentConfig) -> Result<Self, ConnectError> {
        let credentials = auth::select_credentials(config);
        let socket = connect_any(&config.cluster_endpoints).await?;
        let (mut conn_tx, mut conn_rx) = connection::from_socket(socket);

        conn_tx
            .write_frame(&Message::Connect {
                version: PROTOCOL_VERSION.to_owned(),
                credentials,
            })
            .await?;
        let server_pool = match conn_rx.read_frame().await? {
            Some(Message::ConnectAccept { server_pool }) => server_pool,
            Some(Message::ConnectReject { error }) => return Err(ConnectError::Rejected(error)),
            Some(_) => return Err(ConnectError::InvalidHandshake),
            None => return Err(ConnectError::Disconnected),
        };
        if server_pool.is_none() {
            tracing::info!("connected to a plain client scene, pool calls are disabled");
        }

        let responder = Responder::new();
        let (channel, driver) = channel::start(conn_tx, conn_rx, Arc::downgrade(&responder));
        Ok(Self {
            channel,
            responder,
            server_pool,
            driver,
        })
    }

    /// Name of the pool hosting this channel, when the connected scene is
    /// one.
    pub fn server_pool(&self) -> Option<&str> {
        self.server_pool.as_deref()
    }

    /// Requests this server's session assignment and suspends until the
    /// pool provides one.
    ///
    /// No timeout is applied: the call resolves when the pool answers,
    /// fails the call, or the channel goes away. Intended to be issued
    /// once per server lifetime; a repeated call races with any earlier
    /// one still pending.
    pub async fn wait_game_session<T: DeserializeOwned>(
        &self,
    ) -> Result<GameSessionStartupParameters<T>, AgentError> {
        if self.server_pool.is_none() {
            return Err(AgentError::NotAServerPool);
        }
        match self.channel.call(Request::WaitGameSession).await? {
            Response::GameSession { params } => {
                GameSessionStartupParameters::decode(&params).map_err(AgentError::Decode)
            }
            Response::Status(_) => Err(AgentError::UnexpectedResponse),
        }
    }

    /// Installs the producer answering the pool's status probes. Only one
    /// producer exists at a time; a later registration replaces the
    /// earlier one. Until one is installed, probes answer
    /// [`Status::Unknown`].
    ///
    /// The producer runs on the channel task and must be a non-blocking
    /// read of local state.
    pub fn set_status_callback(&self, callback: impl Fn() -> Status + Send + Sync + 'static) {
        self.responder.set_status_callback(Arc::new(callback));
    }

    /// Registers a callback invoked once per shutdown notification from
    /// the pool. Subscribers are independent; dropping the returned
    /// subscription unregisters the callback.
    ///
    /// The responder itself never terminates the process; reacting to the
    /// notification is the subscriber's job.
    pub fn subscribe_shutdown(&self, callback: impl Fn() + Send + Sync + 'static) -> ShutdownSubscription {
        self.responder.subscribe_shutdown(Arc::new(callback))
    }
}

impl Drop for PoolSession {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

async fn connect_any(endpoints: &[String]) -> Result<TcpStream, ConnectError> {
    for endpoint in endpoints {
        match TcpStream::connect(endpoint).await {
            Ok(socket) => {
                tracing::info!(%endpoint, "connected to cluster");
                return Ok(socket);
            }
            Err(error) => tracing::warn!(%endpoint, %error, "cluster endpoint unreachable"),
        }
    }
    Err(ConnectError::NoEndpoint)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use muster_lib::net::connection::{self, ConnectionRx, ConnectionTx};
    use muster_lib::net::{Credentials, Event, Message, ProtocolError, Request, Response};
    use muster_lib::session::{
        GameSessionConfiguration, GameSessionStartupParameters, Status, Team,
    };
    use muster_lib::RequestId;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    use super::{AgentConfig, ConnectError, PoolSession};
    use crate::channel::AgentError;

    /// Accepts one agent connection and answers its handshake, handing the
    /// pool's end of the channel back to the test body.
    async fn accept_agent(
        listener: TcpListener,
        server_pool: Option<&str>,
    ) -> (ConnectionTx, ConnectionRx, Credentials) {
        let (socket, _) = listener.accept().await.unwrap();
        let (mut tx, mut rx) = connection::from_socket(socket);
        let credentials = match rx.read_frame().await.unwrap() {
            Some(Message::Connect { credentials, .. }) => credentials,
            other => panic!("expected Connect, got {other:?}"),
        };
        tx.write_frame(&Message::ConnectAccept {
            server_pool: server_pool.map(str::to_owned),
        })
        .await
        .unwrap();
        (tx, rx, credentials)
    }

    async fn connected_session(
        server_pool: Option<&str>,
        auth_token: Option<&str>,
    ) -> (PoolSession, ConnectionTx, ConnectionRx, Credentials) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let pool = tokio::spawn({
            let server_pool = server_pool.map(str::to_owned);
            async move { accept_agent(listener, server_pool.as_deref()).await }
        });

        let config = AgentConfig {
            cluster_endpoints: vec![addr.to_string()],
            auth_token: auth_token.map(str::to_owned),
            ..Default::default()
        };
        let session = PoolSession::connect(&config).await.unwrap();
        let (tx, rx, credentials) = pool.await.unwrap();
        (session, tx, rx, credentials)
    }

    fn assignment() -> GameSessionStartupParameters<HashMap<String, String>> {
        GameSessionStartupParameters {
            game_session_connection_token: "join-token".to_owned(),
            config: GameSessionConfiguration {
                is_public: false,
                can_restart: true,
                host_user_id: "ada".to_owned(),
                teams: vec![Team {
                    team_id: "blue".to_owned(),
                    groups: Vec::new(),
                }],
                player_ids: vec!["ada".to_owned(), "bob".to_owned()],
                parameters: HashMap::from([("map".to_owned(), "harbor".to_owned())]),
            },
        }
    }

    #[tokio::test]
    async fn wait_game_session_delivers_the_assignment() {
        let (session, mut pool_tx, mut pool_rx, credentials) =
            connected_session(Some("default"), Some("secret")).await;
        assert_eq!(
            credentials,
            Credentials::GameServer {
                token: "secret".to_owned()
            }
        );
        assert_eq!(session.server_pool(), Some("default"));

        let expected = assignment();
        let (received, ()) = tokio::join!(
            session.wait_game_session::<HashMap<String, String>>(),
            async {
                let id = match pool_rx.read_frame().await.unwrap() {
                    Some(Message::Request {
                        id,
                        request: Request::WaitGameSession,
                    }) => id,
                    other => panic!("expected WaitGameSession, got {other:?}"),
                };
                pool_tx
                    .write_frame(&Message::Response {
                        id,
                        result: Ok(Response::GameSession {
                            params: expected.encode().unwrap(),
                        }),
                    })
                    .await
                    .unwrap();
            }
        );
        assert_eq!(received.unwrap(), expected);
    }

    #[tokio::test]
    async fn status_probes_read_the_installed_producer() {
        let (session, mut pool_tx, mut pool_rx, credentials) =
            connected_session(Some("default"), None).await;
        assert_eq!(credentials, Credentials::GameServerDev);

        // Before any producer is installed, probes answer Unknown.
        pool_tx
            .write_frame(&Message::Request {
                id: RequestId(1),
                request: Request::GetStatus,
            })
            .await
            .unwrap();
        match pool_rx.read_frame().await.unwrap() {
            Some(Message::Response {
                id,
                result: Ok(Response::Status(status)),
            }) => {
                assert_eq!(id, RequestId(1));
                assert_eq!(status, Status::Unknown);
            }
            other => panic!("expected a status response, got {other:?}"),
        }

        // A producer answers subsequent probes; a later registration
        // replaces it.
        session.set_status_callback(|| Status::Ready);
        pool_tx
            .write_frame(&Message::Request {
                id: RequestId(2),
                request: Request::GetStatus,
            })
            .await
            .unwrap();
        match pool_rx.read_frame().await.unwrap() {
            Some(Message::Response {
                result: Ok(Response::Status(status)),
                ..
            }) => assert_eq!(status, Status::Ready),
            other => panic!("expected a status response, got {other:?}"),
        }

        session.set_status_callback(|| Status::InProgress);
        pool_tx
            .write_frame(&Message::Request {
                id: RequestId(3),
                request: Request::GetStatus,
            })
            .await
            .unwrap();
        match pool_rx.read_frame().await.unwrap() {
            Some(Message::Response {
                result: Ok(Response::Status(status)),
                ..
            }) => assert_eq!(status, Status::InProgress),
            other => panic!("expected a status response, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn shutdown_reaches_live_subscribers_only() {
        let (session, mut pool_tx, mut pool_rx, _) =
            connected_session(Some("default"), None).await;

        let (kept_tx, mut kept_rx) = mpsc::unbounded_channel();
        let (dropped_tx, mut dropped_rx) = mpsc::unbounded_channel();
        let kept = session.subscribe_shutdown(move || {
            let _ = kept_tx.send(());
        });
        let dropped = session.subscribe_shutdown(move || {
            let _ = dropped_tx.send(());
        });
        drop(dropped);

        pool_tx
            .write_frame(&Message::Event(Event::Shutdown))
            .await
            .unwrap();
        kept_rx.recv().await.unwrap();
        // Both callbacks ran (or not) in the same fan-out pass.
        assert!(dropped_rx.try_recv().is_err());

        drop(kept);
        drop(session);
        // The agent side is gone; the pool observes the close.
        assert!(pool_rx.read_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn a_mismatched_payload_fails_the_wait() {
        let (session, mut pool_tx, mut pool_rx, _) =
            connected_session(Some("default"), None).await;

        let (received, ()) = tokio::join!(
            session.wait_game_session::<HashMap<String, String>>(),
            async {
                let id = match pool_rx.read_frame().await.unwrap() {
                    Some(Message::Request { id, .. }) => id,
                    other => panic!("expected a request, got {other:?}"),
                };
                pool_tx
                    .write_frame(&Message::Response {
                        id,
                        result: Ok(Response::GameSession {
                            params: vec![0xff, 0xff, 0xff],
                        }),
                    })
                    .await
                    .unwrap();
            }
        );
        assert!(matches!(received, Err(AgentError::Decode(_))));
    }

    #[tokio::test]
    async fn a_plain_client_scene_rejects_pool_calls() {
        let (session, _pool_tx, _pool_rx, _) = connected_session(None, None).await;

        assert_eq!(session.server_pool(), None);
        let result = session.wait_game_session::<HashMap<String, String>>().await;
        assert!(matches!(result, Err(AgentError::NotAServerPool)));
    }

    #[tokio::test]
    async fn a_closed_channel_fails_the_wait_instead_of_hanging() {
        let (session, pool_tx, pool_rx, _) = connected_session(Some("default"), None).await;

        // The pool goes away entirely.
        drop(pool_tx);
        drop(pool_rx);

        let result = session.wait_game_session::<HashMap<String, String>>().await;
        assert!(matches!(result, Err(AgentError::ChannelClosed)));
    }

    #[tokio::test]
    async fn a_rejected_handshake_surfaces_the_pool_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let pool = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (mut tx, mut rx) = connection::from_socket(socket);
            let _ = rx.read_frame().await.unwrap();
            tx.write_frame(&Message::ConnectReject {
                error: ProtocolError::AuthenticationFailed("bad token".to_owned()),
            })
            .await
            .unwrap();
        });

        let config = AgentConfig {
            cluster_endpoints: vec![addr.to_string()],
            auth_token: Some("bad".to_owned()),
            ..Default::default()
        };
        let result = PoolSession::connect(&config).await;
        assert!(matches!(
            result,
            Err(ConnectError::Rejected(ProtocolError::AuthenticationFailed(_)))
        ));
        pool.await.unwrap();
    }

    #[tokio::test]
    async fn no_reachable_endpoint_fails_the_connect() {
        let config = AgentConfig::default();
        assert!(matches!(
            PoolSession::connect(&config).await,
            Err(ConnectError::NoEndpoint)
        ));
    }
}
