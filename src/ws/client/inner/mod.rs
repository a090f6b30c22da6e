mod connected;
mod disconnect;
mod init;
mod protocol;
mod reconnect;
mod streaming;
mod supervisor;

pub use disconnect::ConnectionError;
pub use protocol::ProtocolViolation;
pub use streaming::{DispatchEvent, EventStream, GatewayEvent};

pub(crate) use streaming::{EventStreamSender, Outbox};
pub(crate) use supervisor::Supervisor;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future;
use tokio::{
    sync::watch,
    task::{JoinError, JoinHandle},
};

use crate::{
    config::Config,
    ws::{
        session::{ConnectionStage, Credentials, HeartbeatContext, SessionState},
        url::GatewayURLInfo,
    },
};

#[derive(Debug)]
pub(crate) struct ClientInner<S> {
    pub state: S,
}

/// Everything the receive loop and the heartbeat worker both touch.
#[derive(Debug, Default)]
pub(crate) struct SharedState {
    pub stage: ConnectionStage,
    pub session: SessionState,
    pub heartbeat: HeartbeatContext,
    /// writer queue of current connection, only while connected
    pub outbox: Option<Outbox>,
}

#[derive(Debug, Default)]
pub(crate) struct Shared {
    state: Mutex<SharedState>,
}

impl Shared {
    pub fn lock(&self) -> MutexGuard<'_, SharedState> {
        // state stays consistent between statements, a panicked holder can be ignored
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn enter(&self, stage: ConnectionStage, outbox: Option<&Outbox>) {
        let connected = stage == ConnectionStage::Connected;

        let mut state = self.lock();
        state.stage = stage;
        state.session.connected = connected;
        state.outbox = outbox.filter(|_| connected).cloned();
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn new(rx: watch::Receiver<bool>) -> Self {
        Self { rx }
    }

    /// resolve once stop is requested or the owning gateway is dropped
    pub async fn wait(&mut self) {
        let _ = self.rx.wait_for(|stop| *stop).await;
    }

    pub fn is_requested(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }
}

#[derive(Debug)]
pub(crate) struct Context<T> {
    pub config: Arc<Config>,
    pub transport: Arc<T>,
    pub credentials: Credentials,
    pub gateway: GatewayURLInfo,
    pub shared: Arc<Shared>,
    pub events: EventStreamSender,
    pub shutdown: Shutdown,
}

/// Wait for an optional task, pending forever if there is none.
///
/// The slot is emptied once the task finished so it is never polled again.
pub(crate) async fn join_slot<R>(slot: &mut Option<JoinHandle<R>>) -> Result<R, JoinError> {
    let result = match slot.as_mut() {
        Some(handle) => handle.await,
        None => return future::pending().await,
    };
    *slot = None;
    result
}
