//! Gateway websocket protocol client implement

mod client;
pub mod close;
pub mod message;
pub mod session;
pub mod transport;
pub mod url;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{
    Command, ConnectionError, DispatchEvent, EventStream, Gateway, GatewayEvent,
    ProtocolViolation,
};
pub use session::{ConnectionStage, Credentials, HeartbeatContext, SessionState};
pub use transport::{Transport, TungsteniteTransport};
