//! Dedicated-server agent for a muster server pool.
//!
//! A dedicated game-server process uses this crate to read its cluster
//! connection parameters from the environment, authenticate itself as a
//! game server, wait for its session assignment and answer the pool's
//! status probes and shutdown notifications.

pub use channel::AgentError;
pub use config::AgentConfig;
pub use responder::ShutdownSubscription;
pub use session::{ConnectError, PoolSession};

pub mod auth;
pub mod config;

mod channel;
mod responder;
mod session;
