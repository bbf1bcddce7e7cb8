use std::collections::HashMap;
use std::sync::Weak;

use muster_lib::net::connection::{ConnectionRx, ConnectionTx};
use muster_lib::net::{Event, Message, ProtocolError, Request, Response};
use muster_lib::session::Status;
use muster_lib::RequestId;
use thiserror::Error;
use tokio::select;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::responder::Responder;

/// Failure of a call against the pool, surfaced to the application.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The channel to the pool is gone. Distinct from a timeout: the call
    /// fails immediately instead of hanging.
    #[error("The channel to the server pool is closed")]
    ChannelClosed,
    #[error("The connected scene does not host a server pool")]
    NotAServerPool,
    #[error("The pool rejected the call: {0}")]
    Pool(ProtocolError),
    #[error("Failed to decode the game session payload: {0}")]
    Decode(bincode::Error),
    #[error("Unexpected response from the pool")]
    UnexpectedResponse,
}

type CallResult = Result<Response, AgentError>;

enum ChannelCommand {
    Call {
        request: Request,
        respond_to: oneshot::Sender<CallResult>,
    },
}

/// Handle used to issue calls on a driven channel.
#[derive(Clone)]
pub(crate) struct ChannelHandle {
    sender: mpsc::Sender<ChannelCommand>,
}

impl ChannelHandle {
    /// Issues one request and suspends until its response arrives or the
    /// channel goes away. No timeout is applied.
    pub async fn call(&self, request: Request) -> CallResult {
        let (tx, rx) = oneshot::channel();
        let command = ChannelCommand::Call {
            request,
            respond_to: tx,
        };
        if self.sender.send(command).await.is_err() {
            return Err(AgentError::ChannelClosed);
        }
        rx.await.unwrap_or(Err(AgentError::ChannelClosed))
    }
}

/// Spawns the driver task for an established connection. The responder is
/// held weakly: once the owning session is gone, late events are dropped.
pub(crate) fn start(
    conn_tx: ConnectionTx,
    conn_rx: ConnectionRx,
    responder: Weak<Responder>,
) -> (ChannelHandle, JoinHandle<()>) {
    let (sender, commands) = mpsc::channel(64);
    let dispatch = Dispatcher {
        conn_tx,
        responder,
        pending: HashMap::new(),
        next_request: 0,
    };
    let task = tokio::spawn(drive(commands, conn_rx, dispatch));
    (ChannelHandle { sender }, task)
}

/// Multiplexes outbound calls with inbound requests and events until the
/// session drops its handle or the pool closes the connection. In-flight
/// replies are not serialized against inbound probes or events.
async fn drive(
    mut commands: mpsc::Receiver<ChannelCommand>,
    mut conn_rx: ConnectionRx,
    mut dispatch: Dispatcher,
) {
    loop {
        select! {
            command = commands.recv() => match command {
                Some(command) => dispatch.handle_command(command).await,
                // Session dropped; stop driving the connection.
                None => break,
            },
            frame = conn_rx.read_frame() => match frame {
                Ok(Some(message)) => dispatch.handle_message(message).await,
                Ok(None) => {
                    tracing::info!("pool closed the connection");
                    break;
                }
                Err(error) => {
                    tracing::error!(%error, "error reading from the pool, closing the channel");
                    break;
                }
            },
        }
    }
    // Dropping `dispatch.pending` here fails every in-flight call with
    // ChannelClosed.
}

struct Dispatcher {
    conn_tx: ConnectionTx,
    // Non-owning: a disposed session must not receive late callbacks.
    responder: Weak<Responder>,
    pending: HashMap<RequestId, oneshot::Sender<CallResult>>,
    next_request: u32,
}

impl Dispatcher {
    async fn handle_command(&mut self, command: ChannelCommand) {
        match command {
            ChannelCommand::Call {
                request,
                respond_to,
            } => {
                let id: RequestId = self.next_request.into();
                self.next_request = self.next_request.wrapping_add(1);
                let frame = Message::Request { id, request };
                if let Err(error) = self.conn_tx.write_frame(&frame).await {
                    tracing::error!(%error, "failed to send request to the pool");
                    let _ = respond_to.send(Err(AgentError::ChannelClosed));
                    return;
                }
                self.pending.insert(id, respond_to);
            }
        }
    }

    async fn handle_message(&mut self, message: Message) {
        match message {
            Message::Response { id, result } => match self.pending.remove(&id) {
                Some(respond_to) => {
                    let _ = respond_to.send(result.map_err(AgentError::Pool));
                }
                None => tracing::warn!(%id, "response for an unknown request"),
            },
            Message::Request {
                id,
                request: Request::GetStatus,
            } => {
                // A probe against an already-destroyed session reports the
                // server as done.
                let status = match self.responder.upgrade() {
                    Some(responder) => responder.status(),
                    None => Status::Complete,
                };
                let reply = Message::Response {
                    id,
                    result: Ok(Response::Status(status)),
                };
                if let Err(error) = self.conn_tx.write_frame(&reply).await {
                    tracing::error!(%error, "failed to answer a status probe");
                }
            }
            Message::Event(Event::Shutdown) => {
                // Late events against a disposed session are dropped, not
                // errors.
                if let Some(responder) = self.responder.upgrade() {
                    responder.notify_shutdown();
                }
            }
            other => {
                tracing::warn!("unexpected message from the pool: {other:?}");
            }
        }
    }
}
