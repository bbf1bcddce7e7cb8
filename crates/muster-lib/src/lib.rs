use std::fmt::{Debug, Display};

use serde::{Deserialize, Serialize};

pub mod net;
pub mod session;

/// Protocol version exchanged during the connection handshake.
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Correlates an RPC request with its response on a channel.
#[derive(Copy, Clone, PartialEq, Eq, Deserialize, Serialize, Hash)]
pub struct RequestId(pub u32);

impl Debug for RequestId {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        <Self as Display>::fmt(self, f)
    }
}
impl Display for RequestId {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Always display IDs in hex
        write!(f, "{:#X}", self.0)
    }
}

impl From<u32> for RequestId {
    #[inline]
    fn from(v: u32) -> Self {
        Self(v)
    }
}
impl From<RequestId> for u32 {
    #[inline]
    fn from(v: RequestId) -> Self {
        v.0
    }
}
