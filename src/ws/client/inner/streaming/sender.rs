use tokio::sync::mpsc;

use super::{EventStream, GatewayEvent};
use crate::{ws::client::inner::Shutdown, Error};

/// Reserved room in the event channel
#[derive(Debug)]
pub(crate) struct EventPermit<'a> {
    permit: mpsc::Permit<'a, Result<GatewayEvent, Error>>,
}

impl EventPermit<'_> {
    pub fn send(self, event: GatewayEvent) {
        if let GatewayEvent::Dispatch(ref d) = event {
            log::trace!("Send {} event {} to event stream", d.name, d.sequence);
        }
        self.permit.send(Ok(event));
    }
}

#[derive(Debug, Clone)]
pub(crate) struct EventStreamSender {
    event_tx: mpsc::Sender<Result<GatewayEvent, Error>>,
}

impl EventStreamSender {
    pub fn new(capacity: usize, shutdown: Shutdown) -> (Self, EventStream) {
        let (event_tx, event_rx) = mpsc::channel(capacity);

        (
            Self { event_tx },
            EventStream {
                rx: event_rx,
                shutdown,
            },
        )
    }

    /// Returns false if receive side is dropped
    pub async fn send_event(&self, event: GatewayEvent) -> bool {
        if let GatewayEvent::Dispatch(ref d) = event {
            log::trace!("Send {} event {} to event stream", d.name, d.sequence);
        }
        self.event_tx.send(Ok(event)).await.is_ok()
    }

    /// Wait for room in the channel, `None` if receive side is dropped
    pub async fn reserve(&self) -> Option<EventPermit<'_>> {
        let permit = self.event_tx.reserve().await.ok()?;
        Some(EventPermit { permit })
    }

    pub async fn send_err(&self, err: Error) -> bool {
        log::trace!("Send error to event stream: {}", err);
        self.event_tx.send(Err(err)).await.is_ok()
    }

    /// Resolve when receive side is dropped
    pub async fn closed(&self) {
        self.event_tx.closed().await
    }
}
