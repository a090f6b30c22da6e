use std::task::Poll;

use futures_util::Stream;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::{
    ws::{client::inner::Shutdown, message::Dispatch},
    Error,
};

/// A dispatch delivered by gateway
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchEvent {
    /// event name, the `t` field
    pub name: String,
    /// sequence number, the `s` field
    pub sequence: u64,
    /// event payload, the `d` field
    pub payload: Value,
}

impl From<Dispatch> for DispatchEvent {
    fn from(dispatch: Dispatch) -> Self {
        Self {
            name: dispatch.event,
            sequence: dispatch.sequence,
            payload: dispatch.data,
        }
    }
}

/// Item of [`EventStream`]
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEvent {
    /// a dispatch, including READY and RESUMED
    Dispatch(DispatchEvent),
    /// session was invalidated, state built from earlier dispatches may be stale
    SessionReset,
}

impl GatewayEvent {
    /// Dispatch event, if this is one
    pub fn as_dispatch(&self) -> Option<&DispatchEvent> {
        match self {
            Self::Dispatch(d) => Some(d),
            Self::SessionReset => None,
        }
    }
}

/// Stream of gateway events.
///
/// An `Err` item is terminal, the stream ends right after it.
/// Dropping the stream stops the gateway connection. Once the gateway is
/// stopped the stream ends, events still buffered are discarded.
#[derive(Debug)]
pub struct EventStream {
    pub(crate) rx: mpsc::Receiver<Result<GatewayEvent, Error>>,
    pub(crate) shutdown: Shutdown,
}

impl Stream for EventStream {
    type Item = Result<GatewayEvent, Error>;

    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        if self.shutdown.is_requested() {
            self.rx.close();
            return Poll::Ready(None);
        }
        self.rx.poll_recv(cx)
    }
}
