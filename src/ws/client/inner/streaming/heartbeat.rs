use std::{sync::Arc, time::Duration};

use tokio::{
    sync::oneshot,
    task::JoinHandle,
    time::{self, Instant},
};

use super::Outbox;
use crate::ws::client::inner::{join_slot, Shared};

/// Why the heartbeat worker stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HeartbeatExit {
    Stopped,
    /// previous heartbeat still unacknowledged at next tick
    Zombied,
    /// writer queue is gone
    WriterClosed,
    Crashed,
}

#[derive(Debug)]
struct HeartbeatWorker {
    shared: Arc<Shared>,
    outbox: Outbox,
    interval: Duration,
    stop: oneshot::Receiver<()>,
}

impl HeartbeatWorker {
    async fn run(mut self) -> HeartbeatExit {
        // first beat at a random point of the first interval
        let mut tick = Instant::now() + self.interval.mul_f64(rand::random::<f64>());

        log::debug!(
            "Heartbeat start, interval {:?}, first beat at {:?}",
            self.interval,
            tick
        );

        loop {
            tokio::select! {
                biased;

                _ = &mut self.stop => {
                    log::debug!("Heartbeat stop requested");
                    return HeartbeatExit::Stopped;
                }

                _ = time::sleep_until(tick) => {
                    let message = {
                        let mut state = self.shared.lock();
                        if state.heartbeat.ack_pending {
                            log::warn!("Last heartbeat not acknowledged, connection zombied");
                            return HeartbeatExit::Zombied;
                        }
                        state.heartbeat.sent(Instant::now());
                        state.session.heartbeat()
                    };

                    log::trace!("Send heartbeat {:?}", message);

                    if self.outbox.send(message).is_err() {
                        log::debug!("Heartbeat find writer closed, stop");
                        return HeartbeatExit::WriterClosed;
                    }

                    tick += self.interval;
                    log::trace!("Next heartbeat at {:?}", tick);
                }
            }
        }
    }
}

#[derive(Debug)]
pub(crate) struct HeartbeatTask {
    handle: Option<JoinHandle<HeartbeatExit>>,
    stop: Option<oneshot::Sender<()>>,
}

impl HeartbeatTask {
    pub fn spawn(shared: Arc<Shared>, outbox: Outbox, interval: Duration) -> Self {
        shared.lock().heartbeat.start(interval);

        let (stop_tx, stop_rx) = oneshot::channel();
        let worker = HeartbeatWorker {
            shared,
            outbox,
            interval,
            stop: stop_rx,
        };

        Self {
            handle: Some(tokio::spawn(worker.run())),
            stop: Some(stop_tx),
        }
    }

    /// Wait worker to exit on its own
    pub async fn exited(&mut self) -> HeartbeatExit {
        join_slot(&mut self.handle)
            .await
            .unwrap_or(HeartbeatExit::Crashed)
    }

    /// Stop worker and wait it to exit, no heartbeat is sent after this returns
    pub async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            match handle.await {
                Ok(exit) => log::debug!("Heartbeat stopped: {:?}", exit),
                Err(err) => log::error!("Heartbeat task crashed: {}", err),
            }
        }
    }
}
