use std::fmt::Debug;

use futures_util::{Sink, SinkExt};
use tokio::{
    sync::{mpsc, oneshot},
    task::{JoinError, JoinHandle},
};

use crate::ws::{
    client::inner::join_slot,
    message::{Message, MessageStreamSinkError},
};

/// Queue of frames waiting to be written to current connection
pub(crate) type Outbox = mpsc::UnboundedSender<Message>;

/// Single writer of a connection, everything outgoing goes through its outbox
#[derive(Debug)]
struct Writer<S> {
    sink: S,
    rx: mpsc::UnboundedReceiver<Message>,
    stop: oneshot::Receiver<()>,
}

impl<S> Writer<S>
where
    S: Sink<Message, Error = MessageStreamSinkError> + Debug + Unpin,
{
    async fn run(mut self) -> (S, Result<(), MessageStreamSinkError>) {
        log::debug!("Writer start");

        let result = loop {
            tokio::select! {
                biased;

                _ = &mut self.stop => {
                    log::debug!("Writer stop requested, queued frames dropped");
                    break Ok(());
                }

                message = self.rx.recv() => {
                    let message = match message {
                        Some(m) => m,
                        None => {
                            log::debug!("All outboxes dropped, writer stop");
                            break Ok(());
                        }
                    };

                    log::trace!("Writer send {} message", message.type_name());

                    match self.sink.send(message).await {
                        Ok(()) => {}
                        Err(err) if !err.is_fatal() => {
                            log::warn!("Drop message can not be sent: {}", err);
                        }
                        Err(err) => {
                            log::debug!("Writer find message sink broken: {}", err);
                            break Err(err);
                        }
                    }
                }
            }
        };

        (self.sink, result)
    }
}

pub(crate) type WriterExit<S> = (S, Result<(), MessageStreamSinkError>);

#[derive(Debug)]
pub(crate) struct WriterTask<S> {
    handle: Option<JoinHandle<WriterExit<S>>>,
    stop: Option<oneshot::Sender<()>>,
}

impl<S> WriterTask<S>
where
    S: Sink<Message, Error = MessageStreamSinkError> + Debug + Send + Unpin + 'static,
{
    pub fn spawn(sink: S) -> (Self, Outbox) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = oneshot::channel();

        let writer = Writer {
            sink,
            rx,
            stop: stop_rx,
        };

        (
            Self {
                handle: Some(tokio::spawn(writer.run())),
                stop: Some(stop_tx),
            },
            tx,
        )
    }

    /// Stop writer and take back the sink.
    ///
    /// Returns `None` if the task was already joined or crashed.
    pub async fn stop(mut self) -> Option<S> {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }

        match self.handle.take()?.await {
            Ok((sink, _)) => Some(sink),
            Err(err) => {
                log::error!("Writer task crashed: {}", err);
                None
            }
        }
    }

    /// Wait writer to exit on its own
    pub async fn exited(&mut self) -> Result<WriterExit<S>, JoinError> {
        join_slot(&mut self.handle).await
    }
}
