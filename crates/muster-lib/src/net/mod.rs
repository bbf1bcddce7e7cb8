pub use error::{FrameError, ProtocolError};
pub use message::{Credentials, Event, Message, Request, Response};

pub mod connection;
mod error;
mod message;
