mod heartbeat;
mod sender;
mod stream;
mod writer;

pub(crate) use heartbeat::{HeartbeatExit, HeartbeatTask};
pub(crate) use sender::EventStreamSender;
pub(crate) use writer::{Outbox, WriterTask};

pub use stream::{DispatchEvent, EventStream, GatewayEvent};
